//! Bounded event identifiers
//!
//! [`EventId`] is a newtype over `u32` restricted to `[MIN_ID, MAX_ID]`.
//! All arithmetic on it is checked; the only wrapping operation is
//! [`EventId::successor`], which the engine uses when it recycles a queue
//! whose numbering has reached the end of the window.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::TQueueError;

/// Identifier of an event within one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct EventId(u32);

impl EventId {
    /// Smallest valid raw id
    pub const MIN_ID: u32 = 0;
    /// Largest valid raw id (inclusive)
    pub const MAX_ID: u32 = 1_999_999_999;

    /// Smallest valid id
    pub const MIN: EventId = EventId(Self::MIN_ID);
    /// Largest valid id
    pub const MAX: EventId = EventId(Self::MAX_ID);

    /// Create an id from a raw integer
    ///
    /// # Errors
    ///
    /// Returns [`TQueueError::InvalidEventId`] if `raw` is outside
    /// `[MIN_ID, MAX_ID]`.
    pub fn from_raw(raw: i64) -> Result<Self, TQueueError> {
        if Self::is_valid_raw(raw) {
            Ok(Self(raw as u32))
        } else {
            Err(TQueueError::InvalidEventId(raw))
        }
    }

    /// Check whether a raw integer is a representable id
    pub fn is_valid_raw(raw: i64) -> bool {
        (i64::from(Self::MIN_ID)..=i64::from(Self::MAX_ID)).contains(&raw)
    }

    /// Get the raw value
    pub fn value(self) -> u32 {
        self.0
    }

    /// The next id, wrapping from `MAX_ID` to `MIN_ID`
    pub fn successor(self) -> Self {
        if self.0 == Self::MAX_ID {
            Self::MIN
        } else {
            Self(self.0 + 1)
        }
    }

    /// The next id without wrapping
    ///
    /// # Errors
    ///
    /// Fails at `MAX_ID`, where the successor would leave the window.
    pub fn next(self) -> Result<Self, TQueueError> {
        self.advance(1)
    }

    /// Move the id by a signed offset
    ///
    /// # Errors
    ///
    /// Returns [`TQueueError::InvalidEventId`] carrying the would-be raw value
    /// if the result leaves `[MIN_ID, MAX_ID]`.
    pub fn advance(self, delta: i64) -> Result<Self, TQueueError> {
        let raw = i64::from(self.0)
            .checked_add(delta)
            .ok_or(TQueueError::InvalidEventId(if delta < 0 { i64::MIN } else { i64::MAX }))?;
        Self::from_raw(raw)
    }

    /// Signed distance `other - self`
    pub fn distance_to(self, other: EventId) -> i64 {
        i64::from(other.0) - i64::from(self.0)
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for EventId {
    type Error = TQueueError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_raw(i64::from(raw))
    }
}

impl From<EventId> for u32 {
    fn from(id: EventId) -> Self {
        id.0
    }
}
