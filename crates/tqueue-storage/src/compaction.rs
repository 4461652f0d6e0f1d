//! Operation log compaction
//!
//! Folds a recorded [`QueueOp`] sequence into the shortest sequence that
//! replays to the same retained events, heads and tails.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tqueue_core::{Event, QueueId, TQueue, TQueueResult};

use crate::op::QueueOp;

/// Result of a compaction pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionResult {
    /// Operations before folding
    pub entries_before: usize,
    /// Operations after folding
    pub entries_after: usize,
    /// Timestamp of compaction
    pub compacted_at_millis: i64,
}

impl CompactionResult {
    /// Create a new compaction result
    pub fn new(entries_before: usize, entries_after: usize) -> Self {
        Self {
            entries_before,
            entries_after,
            compacted_at_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Number of operations dropped by the pass
    pub fn entries_compacted(&self) -> usize {
        self.entries_before.saturating_sub(self.entries_after)
    }
}

/// Fold `ops` into pushes of the events still retained after replaying them
///
/// A queue whose newest pushed event is gone keeps its tail through a push
/// of that id with an empty payload followed by a pop of it.
pub fn fold(ops: &[QueueOp]) -> TQueueResult<Vec<QueueOp>> {
    let mut scratch = TQueue::new();
    let mut last_pushed: BTreeMap<QueueId, Event> = BTreeMap::new();

    for op in ops {
        op.apply(&mut scratch)?;
        if let QueueOp::Push { queue_id, event } = op {
            last_pushed.insert(*queue_id, event.clone());
        }
    }

    let mut folded = Vec::new();
    for queue_id in scratch.queue_ids() {
        let mut newest_retained = None;
        for event in scratch.retained(queue_id) {
            folded.push(QueueOp::Push {
                queue_id,
                event: event.clone(),
            });
            newest_retained = Some(event.id);
        }

        if let Some(last) = last_pushed.remove(&queue_id)
            && newest_retained != Some(last.id)
        {
            let event_id = last.id;
            folded.push(QueueOp::Push {
                queue_id,
                event: Event {
                    data: Bytes::new(),
                    ..last
                },
            });
            folded.push(QueueOp::Pop { queue_id, event_id });
        }
    }

    debug!(
        before = ops.len(),
        after = folded.len(),
        queues = scratch.queue_count(),
        "Folded operation log"
    );
    Ok(folded)
}
