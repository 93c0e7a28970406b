//! Configuration constants for team balancing and fixture scheduling
//!
//! This module contains the team size bounds, search defaults and points
//! table used throughout the crate so that every component agrees on the
//! same boundaries.

/// Team size configuration constants
pub mod team {
    /// Smallest number of players a team may field
    pub const MIN_SIZE: usize = 4;
    /// Largest number of players a team may field
    pub const MAX_SIZE: usize = 5;
    /// Minimum number of attending players accepted by the balancer
    pub const MIN_PLAYERS: usize = 2;
}

/// Balancer search configuration constants
pub mod search {
    /// Default iteration cap for a single search
    pub const MAX_ITERATIONS: u64 = 1_000_000;
    /// Maximum number of near-best candidates kept in the pool
    pub const POOL_CAP: usize = 50;
    /// Candidates whose spread is within this distance of the best are pooled
    pub const TOLERANCE: f64 = 0.02;
    /// Spreads closer than this are considered equal
    pub const EPSILON: f64 = 1e-9;
    /// Pool size required before a zero-spread search may stop early
    pub const EARLY_STOP_POOL: usize = 10;
    /// Number of iterations between cancellation and time budget checks
    pub const CHECK_INTERVAL: u64 = 4_096;
}

/// Standings configuration constants
pub mod points {
    /// Points awarded for a win
    pub const WIN: u32 = 3;
    /// Points awarded for a draw
    pub const DRAW: u32 = 1;
    /// Points awarded for a loss
    pub const LOSS: u32 = 0;
}
