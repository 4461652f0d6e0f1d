//! Recorded engine mutations
//!
//! A [`QueueOp`] is what a storage adapter remembers about one callback
//! notification. Applying a recorded sequence, in order, to a fresh
//! [`TQueue`] rebuilds the retained events, head and tail of every queue.

use serde::{Deserialize, Serialize};

use tqueue_core::{Event, EventId, QueueId, TQueue, TQueueResult};

/// One recorded engine mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueOp {
    /// An event was appended
    Push {
        /// Queue the event belongs to
        queue_id: QueueId,
        /// The appended event, with its assigned id
        event: Event,
    },
    /// A single event was removed
    Pop {
        /// Queue the event belonged to
        queue_id: QueueId,
        /// Removed event id
        event_id: EventId,
    },
    /// Every event up to and including `up_to` was removed
    Forget {
        /// Affected queue
        queue_id: QueueId,
        /// Inclusive boundary
        up_to: EventId,
    },
}

impl QueueOp {
    /// Queue this operation touches
    pub fn queue_id(&self) -> QueueId {
        match self {
            Self::Push { queue_id, .. } => *queue_id,
            Self::Pop { queue_id, .. } => *queue_id,
            Self::Forget { queue_id, .. } => *queue_id,
        }
    }

    /// Apply the operation to `target` through its replay primitives
    ///
    /// Ids come from the record; the target never assigns new ones and its
    /// callback, if any, is not notified.
    pub fn apply(&self, target: &mut TQueue) -> TQueueResult<()> {
        match self {
            Self::Push { queue_id, event } => target.replay_push(*queue_id, event.clone()),
            Self::Pop { queue_id, event_id } => {
                target.replay_pop(*queue_id, *event_id);
                Ok(())
            }
            Self::Forget { queue_id, up_to } => {
                target.replay_forget(*queue_id, *up_to);
                Ok(())
            }
        }
    }
}
