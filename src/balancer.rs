//! Randomized team balancing
//!
//! The balancer splits the attending players into teams whose average
//! ratings are as close as possible while honouring every hard rule:
//! team sizes between four and five, goalkeepers spread evenly, the
//! organiser's pairing rules, and (for the second match of a
//! double-header) a composition that differs from the first match.
//!
//! The search is a bounded random sampler rather than an exhaustive one.
//! Each iteration shuffles the players into the fixed size profile, throws
//! away draws that break a hard rule, and keeps a small pool of the most
//! balanced draws seen so far. Among equally balanced draws the one that
//! repeats the fewest historical teammate pairs wins.

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use garde::Validate;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Instant;

use crate::{
    constants,
    constraint::{self, Constraint, ConstraintError},
    history::PairCounts,
    player::{Player, PlayerId},
    teams::{Composition, Lineup, Partition, SizeProfile, Team},
};

/// Result type used by the custom `garde` validators in this module
type ValidationResult = Result<(), garde::Error>;

/// Tunable parameters of the search
///
/// Defaults come from [`crate::constants::search`]. Tests and interactive
/// callers usually lower `max_iterations` to keep the search short.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SearchOptions {
    /// Upper bound on the number of draws sampled
    #[garde(range(min = 1))]
    pub max_iterations: u64,
    /// Maximum number of near-best candidates kept for the final pick
    #[garde(range(min = 1))]
    pub pool_cap: usize,
    /// Candidates within this spread of the best are pooled
    #[garde(custom(|v, _| validate_non_negative("tolerance", v)))]
    pub tolerance: f64,
    /// Spreads closer than this are treated as equal
    #[garde(custom(|v, _| validate_positive("epsilon", v)))]
    pub epsilon: f64,
    /// Pool size required before a zero-spread search stops early
    #[garde(skip)]
    pub early_stop_pool: usize,
    /// Iterations between cancellation and time budget checks
    #[garde(range(min = 1))]
    pub check_interval: u64,
    /// Optional wall-clock budget for the whole search, in milliseconds
    #[garde(skip)]
    pub time_budget_ms: Option<u64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_iterations: constants::search::MAX_ITERATIONS,
            pool_cap: constants::search::POOL_CAP,
            tolerance: constants::search::TOLERANCE,
            epsilon: constants::search::EPSILON,
            early_stop_pool: constants::search::EARLY_STOP_POOL,
            check_interval: constants::search::CHECK_INTERVAL,
            time_budget_ms: None,
        }
    }
}

fn validate_non_negative(field: &'static str, val: &f64) -> ValidationResult {
    if val.is_finite() && *val >= 0.0 {
        Ok(())
    } else {
        Err(garde::Error::new(format!("{field} must be a non-negative number")))
    }
}

fn validate_positive(field: &'static str, val: &f64) -> ValidationResult {
    if val.is_finite() && *val > 0.0 {
        Ok(())
    } else {
        Err(garde::Error::new(format!("{field} must be a positive number")))
    }
}

/// Errors that can occur while balancing teams
#[derive(Error, Serialize, Debug, Clone, PartialEq)]
pub enum BalanceError {
    /// Too few players to form any teams
    #[error("at least {min} players are needed, got {got}")]
    NotEnoughPlayers {
        /// Minimum number of players accepted
        min: usize,
        /// Number of players supplied
        got: usize,
    },
    /// The team count is zero or larger than the number of players
    #[error("cannot split {players} players into {teams} teams")]
    InvalidTeamCount {
        /// Number of players supplied
        players: usize,
        /// Number of teams requested
        teams: usize,
    },
    /// The players cannot be split into teams of four or five
    #[error(
        "teams would have between {min} and {max} players, but every team needs {} to {} players",
        constants::team::MIN_SIZE,
        constants::team::MAX_SIZE
    )]
    InvalidTeamSizeBounds {
        /// Size of the smallest team
        min: usize,
        /// Size of the largest team
        max: usize,
    },
    /// The same player was listed twice
    #[error("player {0} is listed more than once")]
    DuplicatePlayer(PlayerId),
    /// A player failed validation
    #[error("player {id} is invalid: {reason}")]
    InvalidPlayer {
        /// The offending player
        id: PlayerId,
        /// Validation report
        reason: String,
    },
    /// The declared rules can never be satisfied
    ///
    /// Rules that are infeasible for any draw (a `MustBeFive` when every
    /// team has four players, or a pair that must be both together and
    /// apart) are reported here before sampling, in place of the
    /// [`BalanceError::NoValidComposition`] an exhausted search would give.
    /// Rules that only fail in combination are still left to the search.
    #[error(transparent)]
    InvalidConstraint(#[from] ConstraintError),
    /// The search options failed validation
    #[error("invalid search options: {0}")]
    InvalidOptions(String),
    /// No draw satisfied every hard rule within the search budget
    #[error("no valid team composition found after {iterations} attempts")]
    NoValidComposition {
        /// Number of draws sampled before giving up
        iterations: u64,
    },
}

/// Why a search stopped sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StopReason {
    /// The iteration budget was used up
    Exhausted,
    /// A perfectly balanced draw was found often enough
    Converged,
    /// The wall-clock budget ran out
    TimedOut,
    /// The caller raised the cancellation flag
    Cancelled,
}

/// The winning partition together with search statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReport {
    /// The selected partition
    pub partition: Partition,
    /// Max minus min team-average rating of the partition
    pub spread: f64,
    /// Sum of squared historical co-occurrence counts of same-team pairs
    pub penalty: u64,
    /// Total number of draws sampled
    pub iterations: u64,
    /// Number of candidates considered for the final pick
    pub pool_size: usize,
    /// Why sampling stopped
    pub stop_reason: StopReason,
}

/// A draw that passed every hard rule
#[derive(Debug, Clone)]
struct Candidate {
    partition: Partition,
    spread: f64,
    penalty: u64,
}

/// Sorts candidates by spread, then penalty, keeping insertion order for ties
///
/// Candidates are first ordered by exact spread. Each run of spreads within
/// `epsilon` of the run's lowest spread is then reordered by penalty, so
/// draws that differ only by rounding noise fall back to the penalty while
/// a clearly lower spread always comes first.
fn sort_candidates(candidates: &mut [Candidate], epsilon: f64) {
    candidates.sort_by(|a, b| a.spread.total_cmp(&b.spread));

    let mut start = 0;
    while start < candidates.len() {
        let floor = candidates[start].spread;
        let run = candidates[start..]
            .iter()
            .take_while(|c| c.spread - floor <= epsilon)
            .count();
        candidates[start..start + run].sort_by_key(|c| c.penalty);
        start += run;
    }
}

/// The near-best candidates seen so far
struct Pool {
    best: f64,
    candidates: Vec<Candidate>,
    cap: usize,
    tolerance: f64,
    epsilon: f64,
    early_stop: usize,
}

impl Pool {
    fn new(options: &SearchOptions) -> Self {
        Self {
            best: f64::INFINITY,
            candidates: Vec::new(),
            cap: options.pool_cap,
            tolerance: options.tolerance,
            epsilon: options.epsilon,
            early_stop: options.early_stop_pool,
        }
    }

    /// Offers a draw with the given spread; `build` is only called if kept
    fn offer(&mut self, spread: f64, build: impl FnOnce() -> Candidate) {
        if spread < self.best - self.epsilon {
            log::trace!("best spread improved to {spread:.4}");
            self.best = spread;
            self.candidates.clear();
        } else if spread > self.best + self.tolerance {
            return;
        }

        self.candidates.push(build());

        if self.candidates.len() > self.cap {
            sort_candidates(&mut self.candidates, self.epsilon);
            self.candidates.truncate(self.cap);
        }
    }

    fn converged(&self) -> bool {
        self.best < self.epsilon && self.candidates.len() >= self.early_stop
    }
}

/// Outcome of one sampling run
struct Exploration {
    candidates: Vec<Candidate>,
    iterations: u64,
    stop: StopReason,
}

/// A draw in progress, viewed as a lineup for constraint checks
struct Draw<'s> {
    team_by_player: &'s [usize],
    index: &'s HashMap<PlayerId, usize>,
    sizes: &'s [usize],
}

impl Lineup for Draw<'_> {
    fn team_count(&self) -> usize {
        self.sizes.len()
    }

    fn team_of(&self, player: PlayerId) -> Option<usize> {
        self.index.get(&player).map(|&i| self.team_by_player[i])
    }

    fn team_size(&self, team: usize) -> Option<usize> {
        self.sizes.get(team).copied()
    }
}

/// Validated, read-only inputs shared by every sampling run
struct Search<'a> {
    players: &'a [Player],
    profile: SizeProfile,
    /// Team index of each slot of a shuffled player order
    slot_team: Vec<usize>,
    /// Position of each player in `players`
    index: HashMap<PlayerId, usize>,
    constraints: &'a [Constraint],
    exclude: Option<&'a Composition>,
    history: Option<&'a PairCounts>,
    options: SearchOptions,
    cancel: Option<&'a AtomicBool>,
}

impl Search<'_> {
    fn explore(&self, rng: &mut fastrand::Rng, budget: u64) -> Exploration {
        let options = &self.options;
        let deadline = options
            .time_budget_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let sizes = self.profile.sizes();

        let mut order = (0..self.players.len()).collect_vec();
        let mut team_by_player = vec![0; self.players.len()];
        let mut keepers = vec![0usize; sizes.len()];
        let mut ratings = vec![0f64; sizes.len()];
        let mut pool = Pool::new(options);
        let mut iterations = 0;
        let mut stop = StopReason::Exhausted;

        while iterations < budget {
            if iterations % options.check_interval == 0 {
                if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    stop = StopReason::Cancelled;
                    break;
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    stop = StopReason::TimedOut;
                    break;
                }
            }
            iterations += 1;

            rng.shuffle(&mut order);
            keepers.fill(0);
            ratings.fill(0.0);
            for (slot, &player) in order.iter().enumerate() {
                let team = self.slot_team[slot];
                team_by_player[player] = team;
                keepers[team] += usize::from(self.players[player].is_keeper);
                ratings[team] += self.players[player].rating;
            }

            if let itertools::MinMaxResult::MinMax(min, max) = keepers.iter().minmax() {
                if max - min > 1 {
                    continue;
                }
            }

            let draw = Draw {
                team_by_player: &team_by_player,
                index: &self.index,
                sizes,
            };
            if !constraint::satisfies_all(&draw, self.constraints) {
                continue;
            }

            if self.is_excluded(&order) {
                continue;
            }

            let spread = match ratings
                .iter()
                .zip(sizes)
                .map(|(sum, &size)| sum / size as f64)
                .minmax_by(f64::total_cmp)
            {
                itertools::MinMaxResult::MinMax(min, max) => max - min,
                _ => 0.0,
            };

            pool.offer(spread, || self.candidate(&order, spread));

            if pool.converged() {
                stop = StopReason::Converged;
                break;
            }
        }

        Exploration {
            candidates: pool.candidates,
            iterations,
            stop,
        }
    }

    fn is_excluded(&self, order: &[usize]) -> bool {
        let Some(exclude) = self.exclude else {
            return false;
        };

        let mut slots = order.iter();
        let groups = self
            .profile
            .sizes()
            .iter()
            .map(|&size| {
                slots
                    .by_ref()
                    .take(size)
                    .map(|&player| self.players[player].id)
                    .collect_vec()
            })
            .collect_vec();

        Composition::new(groups) == *exclude
    }

    fn candidate(&self, order: &[usize], spread: f64) -> Candidate {
        let players = order.iter().map(|&i| self.players[i].clone()).collect();
        let partition = Partition::from_profile(players, &self.profile);
        let penalty = self.history.map_or(0, |history| {
            history.penalty(partition.teams().iter().map(Team::players))
        });

        Candidate {
            partition,
            spread,
            penalty,
        }
    }

    fn finish(
        &self,
        mut candidates: Vec<Candidate>,
        iterations: u64,
        stop: StopReason,
    ) -> Result<BalanceReport, BalanceError> {
        sort_candidates(&mut candidates, self.options.epsilon);
        let pool_size = candidates.len();

        if matches!(stop, StopReason::Cancelled | StopReason::TimedOut) {
            log::warn!(
                "team search stopped early ({stop:?}) after {iterations} draws with {pool_size} candidates"
            );
        }

        let Some(best) = candidates.into_iter().next() else {
            log::debug!("no valid composition after {iterations} draws");
            return Err(BalanceError::NoValidComposition { iterations });
        };

        log::debug!(
            "selected teams with spread {:.4} and penalty {} after {iterations} draws ({stop:?})",
            best.spread,
            best.penalty
        );

        Ok(BalanceReport {
            partition: best.partition,
            spread: best.spread,
            penalty: best.penalty,
            iterations,
            pool_size,
            stop_reason: stop,
        })
    }
}

/// Builder for a single balancing run
///
/// # Examples
///
/// ```rust
/// use lineup::{
///     balancer::{Balancer, SearchOptions},
///     constraint::Constraint,
///     player::{Player, PlayerId},
/// };
///
/// let players: Vec<Player> = (0..10)
///     .map(|i| Player::new(i, format!("Player {i}"), f64::from(i)))
///     .collect();
/// let rules = [Constraint::Apart(PlayerId(0), PlayerId(1))];
///
/// let partition = Balancer::new(&players, 2)
///     .constraints(&rules)
///     .options(SearchOptions { max_iterations: 5_000, ..SearchOptions::default() })
///     .run(&mut fastrand::Rng::with_seed(7))
///     .unwrap();
///
/// assert_eq!(partition.teams().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Balancer<'a> {
    players: &'a [Player],
    team_count: usize,
    constraints: &'a [Constraint],
    exclude: Option<Composition>,
    history: Option<&'a PairCounts>,
    options: SearchOptions,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Balancer<'a> {
    /// Creates a balancer for the given players and team count
    pub fn new(players: &'a [Player], team_count: usize) -> Self {
        Self {
            players,
            team_count,
            constraints: &[],
            exclude: None,
            history: None,
            options: SearchOptions::default(),
            cancel: None,
        }
    }

    /// Sets the hard pairing rules
    pub fn constraints(mut self, constraints: &'a [Constraint]) -> Self {
        self.constraints = constraints;
        self
    }

    /// Requires the result to differ from the given composition
    pub fn exclude(mut self, composition: impl Into<Composition>) -> Self {
        self.exclude = Some(composition.into());
        self
    }

    /// Uses historical teammate counts to break ties
    pub fn history(mut self, history: &'a PairCounts) -> Self {
        self.history = Some(history);
        self
    }

    /// Overrides the search options
    pub fn options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Polls the flag during the search and stops once it is set
    pub fn cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Runs the search and returns the selected partition
    ///
    /// # Errors
    ///
    /// See [`Self::run_report`].
    pub fn run(&self, rng: &mut fastrand::Rng) -> Result<Partition, BalanceError> {
        self.run_report(rng).map(|report| report.partition)
    }

    /// Runs the search and returns the selected partition with statistics
    ///
    /// # Errors
    ///
    /// Returns a [`BalanceError`] describing invalid input before any
    /// sampling happens, or [`BalanceError::NoValidComposition`] if no draw
    /// satisfied every hard rule.
    pub fn run_report(&self, rng: &mut fastrand::Rng) -> Result<BalanceReport, BalanceError> {
        let search = self.prepare()?;
        let exploration = search.explore(rng, search.options.max_iterations);
        search.finish(
            exploration.candidates,
            exploration.iterations,
            exploration.stop,
        )
    }

    /// Runs independent searches on `workers` threads and merges the results
    ///
    /// Worker `w` samples with `fastrand::Rng::with_seed(seed + w)` and gets
    /// an equal share of the iteration budget. The merged pool is ranked
    /// the same way as a single search, so the same seed and worker count
    /// always select the same partition.
    ///
    /// # Errors
    ///
    /// See [`Self::run_report`].
    pub fn run_parallel(&self, workers: usize, seed: u64) -> Result<BalanceReport, BalanceError> {
        let search = self.prepare()?;
        let workers = workers.max(1);
        let total = search.options.max_iterations;
        let share = total / workers as u64;
        let remainder = total % workers as u64;

        let explorations = (0..workers)
            .into_par_iter()
            .map(|worker| {
                let mut rng = fastrand::Rng::with_seed(seed.wrapping_add(worker as u64));
                let budget = share + u64::from((worker as u64) < remainder);
                search.explore(&mut rng, budget)
            })
            .collect::<Vec<_>>();

        let iterations = explorations.iter().map(|e| e.iterations).sum();
        let stop = explorations
            .iter()
            .map(|e| e.stop)
            .max()
            .unwrap_or(StopReason::Exhausted);
        let candidates = explorations
            .into_iter()
            .flat_map(|e| e.candidates)
            .collect_vec();

        search.finish(candidates, iterations, stop)
    }

    fn prepare(&self) -> Result<Search<'_>, BalanceError> {
        self.options
            .validate()
            .map_err(|report| BalanceError::InvalidOptions(report.to_string()))?;

        let player_count = self.players.len();
        if player_count < constants::team::MIN_PLAYERS {
            return Err(BalanceError::NotEnoughPlayers {
                min: constants::team::MIN_PLAYERS,
                got: player_count,
            });
        }

        let profile = SizeProfile::new(player_count, self.team_count)
            .filter(|_| self.team_count <= player_count)
            .ok_or(BalanceError::InvalidTeamCount {
                players: player_count,
                teams: self.team_count,
            })?;

        if !profile.within_bounds() {
            return Err(BalanceError::InvalidTeamSizeBounds {
                min: profile.min(),
                max: profile.max(),
            });
        }

        for player in self.players {
            player
                .validate()
                .map_err(|report| BalanceError::InvalidPlayer {
                    id: player.id,
                    reason: report.to_string(),
                })?;
        }

        let mut index = HashMap::with_capacity(player_count);
        for (position, player) in self.players.iter().enumerate() {
            if index.insert(player.id, position).is_some() {
                return Err(BalanceError::DuplicatePlayer(player.id));
            }
        }

        let attending: HashSet<PlayerId> = index.keys().copied().collect();
        constraint::check_feasible(&attending, &profile, self.constraints)?;

        let slot_team = profile
            .sizes()
            .iter()
            .enumerate()
            .flat_map(|(team, &size)| std::iter::repeat_n(team, size))
            .collect_vec();

        log::debug!(
            "balancing {player_count} players into teams of {:?} with {} rules",
            profile.sizes(),
            self.constraints.len()
        );

        Ok(Search {
            players: self.players,
            profile,
            slot_team,
            index,
            constraints: self.constraints,
            exclude: self.exclude.as_ref(),
            history: self.history,
            options: self.options,
            cancel: self.cancel,
        })
    }
}

/// Splits the players into balanced teams
///
/// Convenience wrapper around [`Balancer`] for callers that have every
/// input at hand.
///
/// # Errors
///
/// See [`Balancer::run_report`].
pub fn balance_teams(
    players: &[Player],
    team_count: usize,
    constraints: &[Constraint],
    exclude: Option<&Composition>,
    history: Option<&PairCounts>,
    options: &SearchOptions,
    rng: &mut fastrand::Rng,
) -> Result<Partition, BalanceError> {
    let mut balancer = Balancer::new(players, team_count)
        .constraints(constraints)
        .options(*options);
    if let Some(exclude) = exclude {
        balancer = balancer.exclude(exclude.clone());
    }
    if let Some(history) = history {
        balancer = balancer.history(history);
    }
    balancer.run(rng)
}
