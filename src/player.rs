//! Attending player model
//!
//! This module defines the immutable view of a player that the balancer
//! works with: a stable integer identifier, a display name, a skill rating
//! and whether the player keeps goal.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Result type used by the custom `garde` validators in this module
type ValidationResult = Result<(), garde::Error>;

/// A unique identifier for a player on the roster
///
/// Identifiers are assigned by the roster owner and stay stable across
/// sessions, which is what lets the pair history recognise repeat teammates.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = ParseIntError;

    /// Parses an identifier from its decimal representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string is not a valid `u32`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<u32> for PlayerId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// An attending player as seen by the balancer
///
/// Players are treated as immutable for the duration of one balancing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Player {
    /// Stable roster identifier
    #[garde(skip)]
    pub id: PlayerId,
    /// Display name
    #[garde(skip)]
    pub name: String,
    /// Skill rating used to balance team averages
    #[garde(custom(|v, _| validate_rating(v)))]
    pub rating: f64,
    /// Whether the player plays in goal
    #[garde(skip)]
    #[serde(default)]
    pub is_keeper: bool,
}

impl Player {
    /// Creates a new outfield player
    pub fn new(id: u32, name: impl Into<String>, rating: f64) -> Self {
        Self {
            id: PlayerId(id),
            name: name.into(),
            rating,
            is_keeper: false,
        }
    }

    /// Creates a new goalkeeper
    pub fn keeper(id: u32, name: impl Into<String>, rating: f64) -> Self {
        Self {
            is_keeper: true,
            ..Self::new(id, name, rating)
        }
    }
}

/// Validates that a rating is a finite number
///
/// Any scale is accepted, so Elo-style ratings work as well as 1 to 10.
///
/// # Errors
///
/// Returns a `garde::Error` if the rating is NaN or infinite.
fn validate_rating(val: &f64) -> ValidationResult {
    if val.is_finite() {
        Ok(())
    } else {
        Err(garde::Error::new(format!("rating must be a finite number, got {val}")))
    }
}
