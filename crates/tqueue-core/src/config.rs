//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::TQueueError;
use crate::event_id::EventId;

/// How the first id of a brand-new queue is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirstEventId {
    /// Always start at the given id
    Fixed(EventId),
    /// Start at a random id in the lower half of the window
    Random,
}

impl Default for FirstEventId {
    fn default() -> Self {
        Self::Fixed(EventId::MIN)
    }
}

/// Configuration for a [`TQueue`](crate::TQueue)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TQueueConfig {
    /// Maximum payload size in bytes
    pub max_event_len: usize,
    /// Maximum number of retained events per queue
    pub max_queue_events: usize,
    /// First id assigned in a queue that has never been pushed to
    pub first_event_id: FirstEventId,
}

impl Default for TQueueConfig {
    fn default() -> Self {
        Self {
            max_event_len: 65536 * 8,
            max_queue_events: 100_000,
            first_event_id: FirstEventId::default(),
        }
    }
}

impl TQueueConfig {
    /// Set the maximum payload size
    pub fn with_max_event_len(mut self, len: usize) -> Self {
        self.max_event_len = len;
        self
    }

    /// Set the per-queue retained event limit
    pub fn with_max_queue_events(mut self, max: usize) -> Self {
        self.max_queue_events = max;
        self
    }

    /// Set the first id policy
    pub fn with_first_event_id(mut self, first: FirstEventId) -> Self {
        self.first_event_id = first;
        self
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<(), TQueueError> {
        if self.max_event_len == 0 {
            return Err(TQueueError::InvalidConfig(
                "max_event_len must be positive".to_string(),
            ));
        }
        if self.max_queue_events == 0 {
            return Err(TQueueError::InvalidConfig(
                "max_queue_events must be positive".to_string(),
            ));
        }
        if let FirstEventId::Fixed(id) = self.first_event_id
            && id.next().is_err()
        {
            return Err(TQueueError::InvalidConfig(format!(
                "first_event_id {} leaves no room for a tail",
                id
            )));
        }
        Ok(())
    }

    /// Pick the first id for a new queue
    pub(crate) fn pick_first_id(&self) -> EventId {
        match self.first_event_id {
            FirstEventId::Fixed(id) => id,
            FirstEventId::Random => {
                let raw = rand::random_range(EventId::MIN_ID..EventId::MAX_ID / 2);
                EventId::from_raw(i64::from(raw)).unwrap_or(EventId::MIN)
            }
        }
    }
}
