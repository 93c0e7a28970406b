//! Historical teammate tracking
//!
//! This module turns past sessions into a symmetric count of how often each
//! pair of players has shared a team. The counts are a soft signal only:
//! the balancer uses them to break ties between equally balanced
//! partitions, never to decide whether a partition is valid.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::{
    player::{Player, PlayerId},
    standings::MatchResult,
};

/// An unordered pair of players
///
/// The smaller identifier is always stored first, so `(a, b)` and `(b, a)`
/// produce the same key. Serialized as `"a-b"` so that pair maps can be
/// written as JSON objects.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct PairKey(PlayerId, PlayerId);

impl PairKey {
    /// Creates the normalized key for two players
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// The two players of the pair, smaller identifier first
    pub fn players(&self) -> (PlayerId, PlayerId) {
        (self.0, self.1)
    }
}

impl Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// Errors that can occur when parsing a [`PairKey`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairKeyError {
    /// The string did not contain a `-` separator
    #[error("pair key must have the form `a-b`")]
    MissingSeparator,
    /// One side of the pair was not a valid player identifier
    #[error("invalid player id in pair key: {0}")]
    InvalidId(#[from] std::num::ParseIntError),
}

impl FromStr for PairKey {
    type Err = PairKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s.split_once('-').ok_or(PairKeyError::MissingSeparator)?;
        Ok(Self::new(a.parse()?, b.parse()?))
    }
}

/// A past session as recorded by the surrounding application
///
/// A session always has a first-round grouping and may record a different
/// grouping for its second round. Match results are carried for
/// completeness but do not influence teammate counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Team grouping used in the first round
    pub teams: Vec<Vec<PlayerId>>,
    /// Team grouping used in the second round, if it differed
    #[serde(default)]
    pub second_round_teams: Option<Vec<Vec<PlayerId>>>,
    /// Results of the matches played during the session
    #[serde(default)]
    pub results: Vec<MatchResult>,
}

/// How often each pair of players has shared a team
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairCounts(HashMap<PairKey, u32>);

impl PairCounts {
    /// Builds the pair counts for a sequence of past sessions
    ///
    /// Every grouping recorded in a session contributes independently, so a
    /// pair that stayed together for both rounds of a session counts twice.
    pub fn from_sessions(sessions: &[SessionRecord]) -> Self {
        let mut counts = Self::default();
        for session in sessions {
            counts.record_teams(&session.teams);
            if let Some(second) = &session.second_round_teams {
                counts.record_teams(second);
            }
        }
        log::debug!(
            "built pair history from {} sessions ({} distinct pairs)",
            sessions.len(),
            counts.0.len()
        );
        counts
    }

    /// Adds one team grouping to the counts
    pub fn record_teams<T: AsRef<[PlayerId]>>(&mut self, teams: &[T]) {
        for team in teams {
            for (a, b) in team.as_ref().iter().tuple_combinations() {
                if a != b {
                    *self.0.entry(PairKey::new(*a, *b)).or_default() += 1;
                }
            }
        }
    }

    /// Number of times the two players have been teammates
    pub fn count(&self, a: PlayerId, b: PlayerId) -> u32 {
        self.0.get(&PairKey::new(a, b)).copied().unwrap_or_default()
    }

    /// Sum of squared pair counts over every pair within one team
    pub fn team_penalty(&self, team: &[Player]) -> u64 {
        if self.0.is_empty() {
            return 0;
        }
        team.iter()
            .tuple_combinations()
            .map(|(a, b)| u64::from(self.count(a.id, b.id)).pow(2))
            .sum()
    }

    /// Sum of [`Self::team_penalty`] over every team
    pub fn penalty<'a, I>(&self, teams: I) -> u64
    where
        I: IntoIterator<Item = &'a [Player]>,
    {
        teams.into_iter().map(|team| self.team_penalty(team)).sum()
    }

    /// Number of distinct pairs with at least one shared team
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no pair has ever shared a team
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the recorded pairs and their counts
    pub fn iter(&self) -> impl Iterator<Item = (PairKey, u32)> + '_ {
        self.0.iter().map(|(key, count)| (*key, *count))
    }
}
