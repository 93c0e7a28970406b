//! Round-two fixture scheduling
//!
//! After the first round each team is ranked by its standing. The second
//! round is drawn greedily from the top of the table: the best remaining
//! team meets the best-ranked remaining team it has not played yet. When
//! every remaining team is a repeat opponent the rematch is accepted and
//! flagged on the returned [`Fixture`].

use std::collections::{HashSet, VecDeque};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{standings::TeamStanding, teams::Partition};

/// Malformed scheduling input
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureError {
    /// Standings must list an even number of teams
    #[error("cannot pair an odd number of teams ({0})")]
    OddTeamCount(usize),
    /// A match refers to a team that has no standing
    #[error("team {0} has no standing")]
    UnknownTeam(usize),
    /// A team appears more than once in the standings
    #[error("team {0} appears more than once in the standings")]
    DuplicateTeam(usize),
    /// A match lists the same team on both sides
    #[error("team {0} cannot play against itself")]
    SelfMatch(usize),
}

/// A scheduled match between two teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fixture {
    /// The higher-ranked team
    pub home: usize,
    /// The lower-ranked team
    pub away: usize,
    /// Whether these teams already met in round one
    pub rematch: bool,
}

impl Fixture {
    /// The two team indices, higher-ranked team first
    pub fn pair(&self) -> (usize, usize) {
        (self.home, self.away)
    }
}

fn matchup(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// The round-one matches of a partition
///
/// Teams `2i` and `2i + 1` meet; a trailing team in an odd count sits out.
pub fn round_one(partition: &Partition) -> Vec<(usize, usize)> {
    partition.matches()
}

/// Draws the round-two fixtures from sorted standings
///
/// `standings` must already be in ranking order (see
/// [`crate::standings::sort_standings`]); the scheduler does not reorder
/// them. The result is deterministic for a given input.
///
/// # Errors
///
/// Returns a [`FixtureError`] if the standings contain an odd number of
/// teams or a duplicate team, or if a round-one match refers to a team
/// missing from the standings.
///
/// # Examples
///
/// ```rust
/// use lineup::{fixtures::schedule_round_two, standings::{compute, MatchResult}};
///
/// let results = [MatchResult::new(0, 1, 2, 0), MatchResult::new(2, 3, 1, 0)];
/// let standings = compute(4, &results).unwrap();
/// let fixtures = schedule_round_two(&[(0, 1), (2, 3)], &standings).unwrap();
///
/// assert_eq!(fixtures[0].pair(), (0, 2));
/// assert_eq!(fixtures[1].pair(), (3, 1));
/// ```
pub fn schedule_round_two(
    round_one: &[(usize, usize)],
    standings: &[TeamStanding],
) -> Result<Vec<Fixture>, FixtureError> {
    if standings.len() % 2 != 0 {
        return Err(FixtureError::OddTeamCount(standings.len()));
    }

    let mut known = HashSet::with_capacity(standings.len());
    if let Some(duplicate) = standings.iter().find(|s| !known.insert(s.team)) {
        return Err(FixtureError::DuplicateTeam(duplicate.team));
    }

    let played = round_one
        .iter()
        .map(|&(a, b)| {
            if a == b {
                Err(FixtureError::SelfMatch(a))
            } else if let Some(&unknown) = [a, b].iter().find(|team| !known.contains(*team)) {
                Err(FixtureError::UnknownTeam(unknown))
            } else {
                Ok(matchup(a, b))
            }
        })
        .collect::<Result<HashSet<_>, _>>()?;

    let mut queue: VecDeque<usize> = standings.iter().map(|s| s.team).collect();
    let mut fixtures = Vec::with_capacity(standings.len() / 2);

    while let Some(home) = queue.pop_front() {
        let fresh = queue
            .iter()
            .position(|&away| !played.contains(&matchup(home, away)));

        let Some(position) = fresh.or_else(|| (!queue.is_empty()).then_some(0)) else {
            break;
        };
        let Some(away) = queue.remove(position) else {
            break;
        };

        let rematch = fresh.is_none();
        if rematch {
            log::warn!("team {home} has played every remaining team, repeating {home} vs {away}");
        }

        fixtures.push(Fixture {
            home,
            away,
            rematch,
        });
    }

    log::debug!(
        "scheduled round two: {}",
        fixtures
            .iter()
            .map(|f| format!("{}-{}", f.home, f.away))
            .join(", ")
    );

    Ok(fixtures)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        player::Player,
        standings::{MatchResult, compute},
        teams::SizeProfile,
    };

    fn ranked(order: &[usize]) -> Vec<TeamStanding> {
        order.iter().map(|&team| TeamStanding::new(team)).collect()
    }

    fn pairs(fixtures: &[Fixture]) -> Vec<(usize, usize)> {
        fixtures.iter().map(Fixture::pair).collect()
    }

    #[test]
    fn test_winners_meet_winners() {
        let results = [MatchResult::new(0, 1, 3, 0), MatchResult::new(2, 3, 2, 1)];
        let standings = compute(4, &results).unwrap();
        let round_one = results.iter().map(MatchResult::teams).collect_vec();

        let fixtures = schedule_round_two(&round_one, &standings).unwrap();

        assert_eq!(pairs(&fixtures), vec![(0, 2), (3, 1)]);
        assert!(fixtures.iter().all(|f| !f.rematch));
    }

    #[test]
    fn test_skips_round_one_opponent() {
        // 0 and 1 played each other but rank first and second.
        let fixtures = schedule_round_two(&[(0, 1), (2, 3)], &ranked(&[0, 1, 2, 3])).unwrap();

        assert_eq!(pairs(&fixtures), vec![(0, 2), (1, 3)]);
    }

    #[test]
    fn test_no_rematch_with_six_teams() {
        let round_one = [(0, 1), (2, 3), (4, 5)];
        let standings = ranked(&[0, 2, 4, 1, 3, 5]);

        let fixtures = schedule_round_two(&round_one, &standings).unwrap();

        for fixture in &fixtures {
            assert!(!round_one.contains(&fixture.pair()));
            assert!(!round_one.contains(&(fixture.away, fixture.home)));
            assert!(!fixture.rematch);
        }
        assert_eq!(pairs(&fixtures), vec![(0, 2), (4, 1), (3, 5)]);
    }

    #[test]
    fn test_fallback_accepts_rematch() {
        let fixtures = schedule_round_two(&[(0, 1)], &ranked(&[1, 0])).unwrap();

        assert_eq!(
            fixtures,
            vec![Fixture {
                home: 1,
                away: 0,
                rematch: true
            }]
        );
    }

    #[test]
    fn test_greedy_fallback_late_in_the_draw() {
        // The greedy draw pairs 0-2 first, which leaves 1 and 3 as a forced rematch.
        let round_one = [(0, 1), (1, 3), (0, 3)];
        let fixtures = schedule_round_two(&round_one, &ranked(&[0, 1, 2, 3])).unwrap();

        assert_eq!(pairs(&fixtures), vec![(0, 2), (1, 3)]);
        assert!(!fixtures[0].rematch);
        assert!(fixtures[1].rematch);
    }

    #[test]
    fn test_deterministic() {
        let round_one = [(0, 1), (2, 3), (4, 5), (6, 7)];
        let standings = ranked(&[5, 1, 7, 0, 2, 6, 3, 4]);

        let first = schedule_round_two(&round_one, &standings).unwrap();
        for _ in 0..10 {
            assert_eq!(schedule_round_two(&round_one, &standings).unwrap(), first);
        }
    }

    #[test]
    fn test_precondition_violations() {
        assert_eq!(
            schedule_round_two(&[(0, 1)], &ranked(&[0, 1, 2])),
            Err(FixtureError::OddTeamCount(3))
        );
        assert_eq!(
            schedule_round_two(&[], &ranked(&[0, 1, 1, 2])),
            Err(FixtureError::DuplicateTeam(1))
        );
        assert_eq!(
            schedule_round_two(&[(0, 5)], &ranked(&[0, 1])),
            Err(FixtureError::UnknownTeam(5))
        );
        assert_eq!(
            schedule_round_two(&[(1, 1)], &ranked(&[0, 1])),
            Err(FixtureError::SelfMatch(1))
        );
    }

    #[test]
    fn test_empty_standings() {
        assert_eq!(schedule_round_two(&[], &[]), Ok(Vec::new()));
    }

    #[test]
    fn test_round_one_from_partition() {
        let players = (0..16).map(|i| Player::new(i, format!("P{i}"), 5.0)).collect();
        let partition = Partition::from_profile(players, &SizeProfile::new(16, 4).unwrap());

        assert_eq!(round_one(&partition), vec![(0, 1), (2, 3)]);
    }
}
