//! User-declared pairing rules
//!
//! Before teams are generated the organiser may pin down a few hard rules:
//! two friends who must play together, two players who must be split up,
//! two players who must face each other, or a player whose team must field
//! five. This module defines those rules and checks a lineup against them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    player::PlayerId,
    teams::{Lineup, SizeProfile, opponent},
};

/// A hard rule that every generated partition must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Both players must be on the same team
    Together(PlayerId, PlayerId),
    /// The players must be on different teams
    Apart(PlayerId, PlayerId),
    /// The players must be on different teams that meet in the same round
    Versus(PlayerId, PlayerId),
    /// The player's team must have exactly five members
    MustBeFive(PlayerId),
}

/// Errors for rule sets that no partition could ever satisfy
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintError {
    /// A rule names a player who is not attending
    #[error("rule refers to player {0} who is not attending")]
    UnknownPlayer(PlayerId),
    /// A rule asks a player to be separated from themselves
    #[error("player {0} cannot be separated from themselves")]
    SelfReference(PlayerId),
    /// A five-a-side rule was declared but every team has four players
    #[error("player {0} must be in a team of five, but no team has five players")]
    NoTeamOfFive(PlayerId),
    /// A versus rule was declared with fewer than two teams
    #[error("players {0} and {1} must face each other, but there is no opposing team")]
    NoOpponent(PlayerId, PlayerId),
    /// Two rules contradict each other for the same pair of players
    #[error("players {0} and {1} cannot be both together and apart")]
    Contradiction(PlayerId, PlayerId),
}

impl Constraint {
    /// Players named by this rule
    pub fn players(&self) -> Vec<PlayerId> {
        match *self {
            Self::Together(a, b) | Self::Apart(a, b) | Self::Versus(a, b) => vec![a, b],
            Self::MustBeFive(a) => vec![a],
        }
    }

    /// Whether the lineup satisfies this rule
    ///
    /// A rule naming a player that is missing from the lineup is never
    /// satisfied.
    pub fn is_satisfied<L: Lineup + ?Sized>(&self, lineup: &L) -> bool {
        match *self {
            Self::Together(a, b) => match (lineup.team_of(a), lineup.team_of(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
            Self::Apart(a, b) => match (lineup.team_of(a), lineup.team_of(b)) {
                (Some(x), Some(y)) => x != y,
                _ => false,
            },
            Self::Versus(a, b) => match (lineup.team_of(a), lineup.team_of(b)) {
                (Some(x), Some(y)) => opponent(x, lineup.team_count()) == Some(y),
                _ => false,
            },
            Self::MustBeFive(a) => lineup
                .team_of(a)
                .and_then(|team| lineup.team_size(team))
                .is_some_and(|size| size == 5),
        }
    }
}

/// Checks a lineup against every rule
///
/// All-or-nothing: a single failing rule rejects the lineup.
pub fn satisfies_all<L: Lineup + ?Sized>(lineup: &L, constraints: &[Constraint]) -> bool {
    constraints.iter().all(|c| c.is_satisfied(lineup))
}

/// Rejects rule sets that cannot be satisfied whatever the draw
///
/// This only catches contradictions visible without searching, such as
/// unknown players or a five-a-side rule when every team has four players.
/// Rule sets that pass may still turn out to be infeasible during search.
///
/// # Errors
///
/// Returns the first [`ConstraintError`] found, in declaration order.
pub fn check_feasible(
    attending: &HashSet<PlayerId>,
    profile: &SizeProfile,
    constraints: &[Constraint],
) -> Result<(), ConstraintError> {
    let mut together = HashSet::new();
    let mut separated = HashSet::new();

    for constraint in constraints {
        if let Some(missing) = constraint
            .players()
            .into_iter()
            .find(|id| !attending.contains(id))
        {
            return Err(ConstraintError::UnknownPlayer(missing));
        }

        match *constraint {
            Constraint::Apart(a, b) | Constraint::Versus(a, b) if a == b => {
                return Err(ConstraintError::SelfReference(a));
            }
            Constraint::Versus(a, b) if profile.team_count() < 2 => {
                return Err(ConstraintError::NoOpponent(a, b));
            }
            Constraint::MustBeFive(a) if !profile.has_size(5) => {
                return Err(ConstraintError::NoTeamOfFive(a));
            }
            Constraint::Together(a, b) => {
                let key = crate::history::PairKey::new(a, b);
                if separated.contains(&key) {
                    return Err(ConstraintError::Contradiction(a, b));
                }
                together.insert(key);
            }
            Constraint::Apart(a, b) | Constraint::Versus(a, b) => {
                let key = crate::history::PairKey::new(a, b);
                if together.contains(&key) {
                    return Err(ConstraintError::Contradiction(a, b));
                }
                separated.insert(key);
            }
            Constraint::MustBeFive(_) => {}
        }
    }

    Ok(())
}
