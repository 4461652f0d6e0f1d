//! Queue events

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::event_id::EventId;

/// Identity of a queue
pub type QueueId = i64;

/// A single event stored in a queue
///
/// `Default` exists so callers can allocate output buffers for
/// [`TQueue::get`](crate::TQueue::get).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier within the owning queue
    pub id: EventId,
    /// Opaque payload
    pub data: Bytes,
    /// Absolute expiration time in seconds
    pub expires_at: f64,
}

impl Event {
    /// Create a new event
    pub fn new(id: EventId, data: impl Into<Bytes>, expires_at: f64) -> Self {
        Self {
            id,
            data: data.into(),
            expires_at,
        }
    }

    /// Whether the event is expired at `now`
    ///
    /// An event stays readable through the instant `now == expires_at`.
    pub fn is_expired(&self, now: f64) -> bool {
        self.expires_at < now
    }
}

/// Outcome of a [`TQueue::get`](crate::TQueue::get) call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fetched {
    /// Number of events written into the output buffer
    pub written: usize,
    /// Whether another readable event follows the last one written
    pub has_more: bool,
}
