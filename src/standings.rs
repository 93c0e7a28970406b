//! Round-one standings
//!
//! This module tallies the results of the first round into a table of team
//! standings and sorts it in the order the fixture scheduler relies on:
//! points, then goal difference, then goals scored, all descending, with
//! the lower team index winning any remaining tie.

use std::cmp::Reverse;

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{constants, fixtures::FixtureError};

/// The result of a single match between two teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Index of the first team
    pub home: usize,
    /// Index of the second team
    pub away: usize,
    /// Goals scored by the first team
    pub home_goals: u32,
    /// Goals scored by the second team
    pub away_goals: u32,
}

impl MatchResult {
    /// Creates a match result
    pub fn new(home: usize, away: usize, home_goals: u32, away_goals: u32) -> Self {
        Self {
            home,
            away,
            home_goals,
            away_goals,
        }
    }

    /// The two teams involved, in the order they were recorded
    pub fn teams(&self) -> (usize, usize) {
        (self.home, self.away)
    }
}

/// How a match ended for one team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Outcome {
    /// The team scored more goals
    Win,
    /// Both teams scored the same number of goals
    Draw,
    /// The team scored fewer goals
    Loss,
}

impl Outcome {
    fn from_goals(scored: u32, conceded: u32) -> Self {
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => Self::Win,
            std::cmp::Ordering::Equal => Self::Draw,
            std::cmp::Ordering::Less => Self::Loss,
        }
    }

    /// League points awarded for this outcome
    pub fn points(self) -> u32 {
        match self {
            Self::Win => constants::points::WIN,
            Self::Draw => constants::points::DRAW,
            Self::Loss => constants::points::LOSS,
        }
    }
}

/// A team's accumulated record after round one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStanding {
    /// Index of the team in the round-one partition
    pub team: usize,
    /// League points (win 3, draw 1, loss 0)
    pub points: u32,
    /// Goals scored minus goals conceded
    pub goal_difference: i64,
    /// Goals scored
    pub goals_for: u32,
    /// Goals conceded
    pub goals_against: u32,
    /// Number of wins, draws and losses
    pub record: EnumMap<Outcome, u32>,
}

impl TeamStanding {
    /// Creates an empty standing for a team
    pub fn new(team: usize) -> Self {
        Self {
            team,
            ..Self::default()
        }
    }

    fn record_match(&mut self, scored: u32, conceded: u32) {
        let outcome = Outcome::from_goals(scored, conceded);
        self.record[outcome] += 1;
        self.points += outcome.points();
        self.goals_for += scored;
        self.goals_against += conceded;
        self.goal_difference += i64::from(scored) - i64::from(conceded);
    }

    /// Number of matches played
    pub fn played(&self) -> u32 {
        self.record.values().sum()
    }
}

/// Sorts standings into scheduling order
///
/// Points, goal difference and goals scored are compared in descending
/// order, then team index in ascending order.
pub fn sort_standings(standings: &mut [TeamStanding]) {
    standings.sort_by_key(|s| {
        (
            Reverse(s.points),
            Reverse(s.goal_difference),
            Reverse(s.goals_for),
            s.team,
        )
    });
}

/// Tallies match results into sorted standings
///
/// Every team in `0..team_count` gets an entry, including teams that have
/// not played.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownTeam`] if a result refers to a team index
/// outside `0..team_count`, or [`FixtureError::SelfMatch`] if a team is
/// recorded as playing itself.
pub fn compute(
    team_count: usize,
    results: &[MatchResult],
) -> Result<Vec<TeamStanding>, FixtureError> {
    let mut standings = (0..team_count).map(TeamStanding::new).collect_vec();

    for result in results {
        if result.home == result.away {
            return Err(FixtureError::SelfMatch(result.home));
        }
        if let Some(unknown) = [result.home, result.away]
            .into_iter()
            .find(|&team| team >= team_count)
        {
            return Err(FixtureError::UnknownTeam(unknown));
        }

        standings[result.home].record_match(result.home_goals, result.away_goals);
        standings[result.away].record_match(result.away_goals, result.home_goals);
    }

    sort_standings(&mut standings);
    Ok(standings)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn order(standings: &[TeamStanding]) -> Vec<usize> {
        standings.iter().map(|s| s.team).collect()
    }

    #[test]
    fn test_points_for_outcomes() {
        let standings = compute(
            4,
            &[MatchResult::new(0, 1, 3, 1), MatchResult::new(2, 3, 2, 2)],
        )
        .unwrap();

        let by_team = |team: usize| standings.iter().find(|s| s.team == team).unwrap();

        assert_eq!(by_team(0).points, 3);
        assert_eq!(by_team(1).points, 0);
        assert_eq!(by_team(2).points, 1);
        assert_eq!(by_team(3).points, 1);
        assert_eq!(by_team(0).goal_difference, 2);
        assert_eq!(by_team(1).goal_difference, -2);
        assert_eq!(by_team(0).record[Outcome::Win], 1);
        assert_eq!(by_team(2).record[Outcome::Draw], 1);
        assert_eq!(by_team(1).played(), 1);
    }

    #[test]
    fn test_tie_break_order() {
        // 0 and 2 both win by two, 2 scored more. 1 and 3 both lose by two, 3 scored more.
        let standings = compute(
            4,
            &[MatchResult::new(0, 1, 3, 1), MatchResult::new(2, 3, 4, 2)],
        )
        .unwrap();
        assert_eq!(order(&standings), vec![2, 0, 3, 1]);
    }

    #[test]
    fn test_team_index_breaks_full_ties() {
        let standings = compute(
            4,
            &[MatchResult::new(3, 2, 1, 1), MatchResult::new(1, 0, 1, 1)],
        )
        .unwrap();
        assert_eq!(order(&standings), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_teams_without_results_are_listed() {
        let standings = compute(3, &[MatchResult::new(0, 1, 0, 1)]).unwrap();
        assert_eq!(order(&standings), vec![1, 2, 0]);
        assert_eq!(standings[1].played(), 0);
    }

    #[test]
    fn test_invalid_results() {
        assert_eq!(
            compute(2, &[MatchResult::new(0, 2, 1, 0)]),
            Err(FixtureError::UnknownTeam(2))
        );
        assert_eq!(
            compute(2, &[MatchResult::new(1, 1, 1, 0)]),
            Err(FixtureError::SelfMatch(1))
        );
    }

    #[test]
    fn test_sort_caller_built_standings() {
        let mut standings = vec![
            TeamStanding {
                team: 1,
                points: 3,
                goal_difference: 1,
                goals_for: 2,
                ..TeamStanding::default()
            },
            TeamStanding {
                team: 0,
                points: 3,
                goal_difference: 1,
                goals_for: 2,
                ..TeamStanding::default()
            },
            TeamStanding {
                team: 2,
                points: 4,
                ..TeamStanding::default()
            },
        ];
        sort_standings(&mut standings);
        assert_eq!(order(&standings), vec![2, 0, 1]);
    }
}
