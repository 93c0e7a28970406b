//! # Lineup
//!
//! This library splits the players attending a recurring team-sport session
//! into balanced teams and, for two-round sessions, draws the second-round
//! fixtures from the first-round table.
//!
//! The two entry points are [`balance_teams`] (or the [`Balancer`] builder)
//! and [`schedule_round_two`]. Both are pure: every input is passed in,
//! including the random source, so identical seeds reproduce identical
//! teams.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::doc_markdown)]

use serde::Serialize;
use thiserror::Error as ThisError;

pub mod balancer;
pub mod constants;
pub mod constraint;
pub mod fixtures;
pub mod history;
pub mod player;
pub mod standings;
pub mod teams;

pub use balancer::{BalanceError, BalanceReport, Balancer, SearchOptions, balance_teams};
pub use constraint::Constraint;
pub use fixtures::{Fixture, FixtureError, schedule_round_two};
pub use history::{PairCounts, SessionRecord};
pub use player::{Player, PlayerId};
pub use standings::{MatchResult, TeamStanding};
pub use teams::{Composition, Partition, Team};

/// Any error reported by this crate
///
/// Every variant carries a message meant to be shown to the organiser as
/// is.
#[derive(ThisError, Serialize, Debug, Clone, PartialEq, derive_more::From)]
pub enum Error {
    /// Team generation failed
    #[error(transparent)]
    Balance(BalanceError),
    /// Fixture scheduling failed
    #[error(transparent)]
    Fixture(FixtureError),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn session_players() -> Vec<Player> {
        [
            ("Ana", 8.0, true),
            ("Ben", 7.5, false),
            ("Caz", 7.0, false),
            ("Dev", 6.5, false),
            ("Eli", 6.0, true),
            ("Fin", 6.0, false),
            ("Gus", 5.5, false),
            ("Hal", 5.0, true),
            ("Ivy", 5.0, false),
            ("Jo", 4.5, false),
            ("Kit", 4.0, true),
            ("Lou", 4.0, false),
            ("Max", 3.5, false),
            ("Ned", 3.0, false),
            ("Oli", 2.5, false),
            ("Pat", 2.0, false),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (name, rating, keeper))| Player {
            is_keeper: keeper,
            ..Player::new(i as u32 + 100, name, rating)
        })
        .collect()
    }

    #[test]
    fn test_full_session() {
        let players = session_players();
        let history = PairCounts::from_sessions(&[SessionRecord {
            teams: vec![
                vec![PlayerId(100), PlayerId(101), PlayerId(102), PlayerId(103)],
                vec![PlayerId(104), PlayerId(105), PlayerId(106), PlayerId(107)],
            ],
            ..SessionRecord::default()
        }]);
        let rules = [
            Constraint::Together(PlayerId(110), PlayerId(111)),
            Constraint::Versus(PlayerId(100), PlayerId(101)),
        ];
        let options = SearchOptions {
            max_iterations: 30_000,
            ..SearchOptions::default()
        };

        let partition = balance_teams(
            &players,
            4,
            &rules,
            None,
            Some(&history),
            &options,
            &mut fastrand::Rng::with_seed(2024),
        )
        .unwrap();

        assert_eq!(partition.player_count(), players.len());
        assert_eq!(partition.keeper_spread(), 0);
        assert!(constraint::satisfies_all(&partition, &rules));

        let round_one = fixtures::round_one(&partition);
        assert_eq!(round_one, vec![(0, 1), (2, 3)]);

        let results = [MatchResult::new(0, 1, 2, 2), MatchResult::new(2, 3, 0, 1)];
        let table = standings::compute(4, &results).unwrap();
        let round_two = schedule_round_two(&round_one, &table).unwrap();

        assert_eq!(round_two.len(), 2);
        assert!(round_two.iter().all(|f| !f.rematch));
        assert_eq!(round_two[0].pair(), (3, 0));
    }

    #[test]
    fn test_errors_convert_into_crate_error() {
        let error: Error = FixtureError::OddTeamCount(3).into();
        assert_eq!(error.to_string(), "cannot pair an odd number of teams (3)");

        let error: Error = BalanceError::InvalidTeamSizeBounds { min: 3, max: 3 }.into();
        assert_eq!(
            error.to_string(),
            "teams would have between 3 and 3 players, but every team needs 4 to 5 players"
        );
    }
}
