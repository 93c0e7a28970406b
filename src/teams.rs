//! Team formation primitives
//!
//! This module holds the ordered team partition produced by the balancer,
//! the size profile that decides how many players each team receives, and
//! the composition key used to tell two partitions apart regardless of team
//! order.
//!
//! Team order inside a [`Partition`] is meaningful: the teams at indices
//! `2i` and `2i + 1` meet each other in the same round. [`opponent`] and
//! [`Partition::matches`] are the only places that encode this convention.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    constants,
    player::{Player, PlayerId},
};

/// Returns the team that `team` plays against within a round
///
/// Teams are paired as `(0, 1)`, `(2, 3)`, ... A trailing team in an odd
/// team count has no opponent.
pub fn opponent(team: usize, team_count: usize) -> Option<usize> {
    let other = team ^ 1;
    (team < team_count && other < team_count).then_some(other)
}

/// Read-only view of "who plays for which team"
///
/// Constraint checks only need to locate players and measure teams, so they
/// are written against this trait. [`Partition`] implements it, and so does
/// the balancer's internal draw, which avoids building a full partition for
/// every rejected candidate.
pub trait Lineup {
    /// Number of teams in the lineup
    fn team_count(&self) -> usize;

    /// Index of the team the player was assigned to, if any
    fn team_of(&self, player: PlayerId) -> Option<usize>;

    /// Number of players in the given team
    fn team_size(&self, team: usize) -> Option<usize>;
}

/// The number of players each team receives, in team order
///
/// With `N` players and `K` teams every team gets `N / K` players and the
/// first `N % K` teams receive one extra.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeProfile(Vec<usize>);

impl SizeProfile {
    /// Computes the size profile for a player and team count
    ///
    /// Returns `None` when `team_count` is zero.
    pub fn new(player_count: usize, team_count: usize) -> Option<Self> {
        if team_count == 0 {
            return None;
        }

        let base_size = player_count / team_count;
        let remainder = player_count % team_count;

        Some(Self(
            (0..team_count)
                .map(|index| base_size + usize::from(index < remainder))
                .collect(),
        ))
    }

    /// Size of the smallest team
    pub fn min(&self) -> usize {
        self.0.iter().copied().min().unwrap_or_default()
    }

    /// Size of the largest team
    pub fn max(&self) -> usize {
        self.0.iter().copied().max().unwrap_or_default()
    }

    /// Whether every team size lies within the allowed bounds
    pub fn within_bounds(&self) -> bool {
        self.min() >= constants::team::MIN_SIZE && self.max() <= constants::team::MAX_SIZE
    }

    /// Number of teams described by this profile
    pub fn team_count(&self) -> usize {
        self.0.len()
    }

    /// Whether any team in this profile receives exactly `size` players
    pub fn has_size(&self, size: usize) -> bool {
        self.0.contains(&size)
    }

    /// The team sizes in team order
    pub fn sizes(&self) -> &[usize] {
        &self.0
    }
}

/// A single team inside a partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Team(Vec<Player>);

impl Team {
    /// Creates a team from its players
    pub fn new(players: Vec<Player>) -> Self {
        Self(players)
    }

    /// The players on this team
    pub fn players(&self) -> &[Player] {
        &self.0
    }

    /// Number of players on this team
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the team has no players
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the given player is on this team
    pub fn contains(&self, player: PlayerId) -> bool {
        self.0.iter().any(|p| p.id == player)
    }

    /// Number of goalkeepers on this team
    pub fn keeper_count(&self) -> usize {
        self.0.iter().filter(|p| p.is_keeper).count()
    }

    /// Mean rating of the team, or zero for an empty team
    pub fn average_rating(&self) -> f64 {
        if self.0.is_empty() {
            0.0
        } else {
            self.0.iter().map(|p| p.rating).sum::<f64>() / self.0.len() as f64
        }
    }

    /// Player identifiers on this team, in ascending order
    pub fn ids(&self) -> Vec<PlayerId> {
        self.0.iter().map(|p| p.id).sorted().collect_vec()
    }
}

/// An ordered assignment of every input player to exactly one team
///
/// Teams at indices `2i` and `2i + 1` play each other in the same round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    teams: Vec<Team>,
    /// Team index for each player, rebuilt after deserialization
    #[serde(skip)]
    index: HashMap<PlayerId, usize>,
}

#[derive(Deserialize)]
struct PartitionSerde {
    teams: Vec<Team>,
}

impl<'de> Deserialize<'de> for Partition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        PartitionSerde::deserialize(deserializer).map(|serde| Self::new(serde.teams))
    }
}

impl Partition {
    /// Creates a partition from already formed teams
    pub fn new(teams: Vec<Team>) -> Self {
        let index = teams
            .iter()
            .enumerate()
            .flat_map(|(team, t)| t.players().iter().map(move |p| (p.id, team)))
            .collect();
        Self { teams, index }
    }

    /// Slices an ordered list of players into teams following a size profile
    ///
    /// Players are taken in order: the first `sizes[0]` players form team 0,
    /// the next `sizes[1]` form team 1, and so on. Players beyond the profile
    /// are ignored.
    pub fn from_profile(players: Vec<Player>, profile: &SizeProfile) -> Self {
        let mut players = players.into_iter();
        let teams = profile
            .sizes()
            .iter()
            .map(|&size| Team::new(players.by_ref().take(size).collect()))
            .collect();
        Self::new(teams)
    }

    /// The teams in round order
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Consumes the partition, returning its teams
    pub fn into_teams(self) -> Vec<Team> {
        self.teams
    }

    /// Total number of players across all teams
    pub fn player_count(&self) -> usize {
        self.teams.iter().map(Team::len).sum()
    }

    /// The explicit `(2i, 2i + 1)` matches of a round
    pub fn matches(&self) -> Vec<(usize, usize)> {
        (0..self.teams.len())
            .step_by(2)
            .filter_map(|team| opponent(team, self.teams.len()).map(|other| (team, other)))
            .collect_vec()
    }

    /// Difference between the highest and lowest team average rating
    pub fn rating_spread(&self) -> f64 {
        match self
            .teams
            .iter()
            .map(Team::average_rating)
            .minmax_by(f64::total_cmp)
        {
            itertools::MinMaxResult::NoElements | itertools::MinMaxResult::OneElement(_) => 0.0,
            itertools::MinMaxResult::MinMax(min, max) => max - min,
        }
    }

    /// Difference between the most and fewest goalkeepers on any team
    pub fn keeper_spread(&self) -> usize {
        match self.teams.iter().map(Team::keeper_count).minmax() {
            itertools::MinMaxResult::NoElements | itertools::MinMaxResult::OneElement(_) => 0,
            itertools::MinMaxResult::MinMax(min, max) => max - min,
        }
    }

    /// The order-independent composition of this partition
    pub fn composition(&self) -> Composition {
        Composition::new(self.teams.iter().map(Team::ids).collect())
    }
}

impl Lineup for Partition {
    fn team_count(&self) -> usize {
        self.teams.len()
    }

    fn team_of(&self, player: PlayerId) -> Option<usize> {
        self.index.get(&player).copied()
    }

    fn team_size(&self, team: usize) -> Option<usize> {
        self.teams.get(team).map(Team::len)
    }
}

/// A partition reduced to its multiset of unordered player sets
///
/// Two compositions are equal when they contain the same teams, regardless
/// of which index each team was given or the order of players within a
/// team. Used to force a different lineup for the second match of a
/// double-header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<PlayerId>>", into = "Vec<Vec<PlayerId>>")]
pub struct Composition(Vec<Vec<PlayerId>>);

impl Composition {
    /// Normalizes a list of player groups into a composition
    pub fn new(groups: Vec<Vec<PlayerId>>) -> Self {
        Self(
            groups
                .into_iter()
                .map(|group| group.into_iter().sorted().collect_vec())
                .sorted()
                .collect(),
        )
    }

    /// The normalized groups
    pub fn groups(&self) -> &[Vec<PlayerId>] {
        &self.0
    }
}

impl From<Vec<Vec<PlayerId>>> for Composition {
    fn from(groups: Vec<Vec<PlayerId>>) -> Self {
        Self::new(groups)
    }
}

impl From<Composition> for Vec<Vec<PlayerId>> {
    fn from(composition: Composition) -> Self {
        composition.0
    }
}

impl From<&Partition> for Composition {
    fn from(partition: &Partition) -> Self {
        partition.composition()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn roster(ratings: &[f64]) -> Vec<Player> {
        ratings
            .iter()
            .enumerate()
            .map(|(i, &rating)| Player::new(i as u32, format!("Player {i}"), rating))
            .collect()
    }

    fn test_profile(players: usize, teams: usize, expected: &[usize]) {
        let profile = SizeProfile::new(players, teams).unwrap();
        assert_eq!(profile.sizes(), expected, "{players} players in {teams} teams");
        assert_eq!(profile.sizes().iter().sum::<usize>(), players);
    }

    #[test]
    fn test_size_profile_perfect_distribution() {
        for teams in 1..=6 {
            test_profile(4 * teams, teams, &[4].repeat(teams));
            test_profile(5 * teams, teams, &[5].repeat(teams));
        }
    }

    #[test]
    fn test_size_profile_extra_players_go_first() {
        test_profile(9, 2, &[5, 4]);
        test_profile(14, 3, &[5, 5, 4]);
        test_profile(22, 5, &[5, 5, 4, 4, 4]);
        test_profile(9, 3, &[3, 3, 3]);
    }

    #[test]
    fn test_size_profile_bounds() {
        assert!(SizeProfile::new(9, 2).unwrap().within_bounds());
        assert!(!SizeProfile::new(9, 3).unwrap().within_bounds());
        assert!(!SizeProfile::new(11, 2).unwrap().within_bounds());
        assert!(SizeProfile::new(30, 6).unwrap().within_bounds());
        assert!(SizeProfile::new(8, 0).is_none());
    }

    #[test]
    fn test_opponent_pairs_neighbours() {
        assert_eq!(opponent(0, 4), Some(1));
        assert_eq!(opponent(1, 4), Some(0));
        assert_eq!(opponent(3, 4), Some(2));
        assert_eq!(opponent(2, 3), None);
        assert_eq!(opponent(5, 4), None);
    }

    #[test]
    fn test_partition_from_profile() {
        let players = roster(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let profile = SizeProfile::new(players.len(), 2).unwrap();
        let partition = Partition::from_profile(players, &profile);

        assert_eq!(partition.teams()[0].len(), 5);
        assert_eq!(partition.teams()[1].len(), 4);
        assert_eq!(partition.player_count(), 9);
        assert_eq!(partition.team_of(PlayerId(4)), Some(0));
        assert_eq!(partition.team_of(PlayerId(5)), Some(1));
        assert_eq!(partition.team_of(PlayerId(99)), None);
        assert_eq!(partition.team_size(1), Some(4));
        assert_eq!(partition.team_size(2), None);
    }

    #[test]
    fn test_partition_spreads() {
        let mut players = roster(&[8.0, 5.0, 4.0, 1.0, 7.0, 6.0, 3.0, 2.0]);
        players[0].is_keeper = true;
        players[1].is_keeper = true;
        let profile = SizeProfile::new(players.len(), 2).unwrap();
        let partition = Partition::from_profile(players, &profile);

        assert!(partition.rating_spread().abs() < 1e-12);
        assert_eq!(partition.keeper_spread(), 2);
    }

    #[test]
    fn test_partition_matches() {
        let players = roster(&[5.0; 20]);
        let profile = SizeProfile::new(20, 5).unwrap();
        let partition = Partition::from_profile(players, &profile);

        assert_eq!(partition.matches(), vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn test_composition_ignores_order() {
        let a = Composition::new(vec![
            vec![PlayerId(3), PlayerId(1)],
            vec![PlayerId(2), PlayerId(4)],
        ]);
        let b = Composition::new(vec![
            vec![PlayerId(4), PlayerId(2)],
            vec![PlayerId(1), PlayerId(3)],
        ]);
        let c = Composition::new(vec![
            vec![PlayerId(1), PlayerId(2)],
            vec![PlayerId(3), PlayerId(4)],
        ]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_partition_deserialize_rebuilds_index() {
        let players = roster(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let profile = SizeProfile::new(8, 2).unwrap();
        let partition = Partition::from_profile(players, &profile);

        let json = serde_json::to_string(&partition).unwrap();
        let restored: Partition = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.team_of(PlayerId(6)), Some(1));
        assert_eq!(restored.composition(), partition.composition());
    }
}
