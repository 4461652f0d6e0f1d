//! In-memory storage adapter
//!
//! [`TQueueMemoryStorage`] keeps every notification it receives as an
//! ordered [`QueueOp`] log. Replaying that log into a fresh engine models a
//! restart that keeps everything which was mirrored, without real I/O.
//!
//! The log folds itself whenever it doubles past its last folded size, so
//! popped and forgotten events do not accumulate.

use tracing::{debug, warn};

use tqueue_core::{Event, EventId, QueueId, StorageError, TQueue, TQueueCallback, TQueueResult};

use crate::compaction::{self, CompactionResult};
use crate::op::QueueOp;

/// Log length below which the storage never folds itself
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 1024;

/// Memory-backed implementation of [`TQueueCallback`]
#[derive(Debug, Clone)]
pub struct TQueueMemoryStorage {
    ops: Vec<QueueOp>,
    threshold: usize,
    compact_at: usize,
}

impl Default for TQueueMemoryStorage {
    fn default() -> Self {
        Self::with_compaction_threshold(DEFAULT_COMPACTION_THRESHOLD)
    }
}

impl TQueueMemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty storage that starts folding at `threshold` operations
    pub fn with_compaction_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            ops: Vec::new(),
            threshold,
            compact_at: threshold,
        }
    }

    /// Number of recorded operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Recorded operations in the order they were received
    pub fn ops(&self) -> &[QueueOp] {
        &self.ops
    }

    /// Apply every recorded operation, in order, to `target`
    ///
    /// `target` should be freshly created; replaying into an engine that
    /// already holds events of the same queues fails on the first push that
    /// does not come after its newest retained event.
    pub fn replay(&self, target: &mut TQueue) -> TQueueResult<()> {
        for op in &self.ops {
            op.apply(target)?;
        }
        debug!(
            ops = self.ops.len(),
            queues = target.queue_count(),
            "Replayed memory storage"
        );
        Ok(())
    }

    /// Fold the recorded log into its shortest equivalent
    pub fn compact(&mut self) -> TQueueResult<CompactionResult> {
        let folded = compaction::fold(&self.ops)?;
        let result = CompactionResult::new(self.ops.len(), folded.len());
        self.ops = folded;
        self.compact_at = self.threshold.max(2 * self.ops.len());
        debug!(
            before = result.entries_before,
            after = result.entries_after,
            "Compacted memory storage"
        );
        Ok(result)
    }

    fn record(&mut self, op: QueueOp) {
        self.ops.push(op);
        if self.ops.len() < self.compact_at {
            return;
        }
        if let Err(e) = self.compact() {
            // The log still replays as recorded; try again once it doubles
            warn!(error = %e, ops = self.ops.len(), "Memory storage compaction failed");
            self.compact_at = 2 * self.ops.len();
        }
    }
}

impl TQueueCallback for TQueueMemoryStorage {
    fn on_push(&mut self, queue_id: QueueId, event: &Event) -> Result<(), StorageError> {
        self.record(QueueOp::Push {
            queue_id,
            event: event.clone(),
        });
        Ok(())
    }

    fn on_forget(&mut self, queue_id: QueueId, up_to: EventId) -> Result<(), StorageError> {
        self.record(QueueOp::Forget { queue_id, up_to });
        Ok(())
    }

    fn on_pop(&mut self, queue_id: QueueId, event_id: EventId) -> Result<(), StorageError> {
        self.record(QueueOp::Pop { queue_id, event_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restart(mut engine: TQueue) -> TQueue {
        engine.emulate_restart();
        let storage = engine
            .extract_callback_as::<TQueueMemoryStorage>()
            .unwrap();
        let mut fresh = TQueue::new();
        storage.replay(&mut fresh).unwrap();
        fresh.set_callback(storage);
        fresh
    }

    #[test]
    fn test_records_every_notification() {
        let mut engine = TQueue::new();
        engine.set_callback(Box::new(TQueueMemoryStorage::new()));

        engine.push(1, "a", 5.0, None).unwrap();
        engine.push(1, "b", 50.0, None).unwrap();
        engine.push(2, "c", 50.0, None).unwrap();
        engine.run_gc(10.0).unwrap();

        let storage = engine
            .extract_callback_as::<TQueueMemoryStorage>()
            .unwrap();
        assert_eq!(storage.len(), 4);
        assert!(matches!(storage.ops()[3], QueueOp::Pop { queue_id: 1, .. }));
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut engine = TQueue::new();
        engine.set_callback(Box::new(TQueueMemoryStorage::new()));
        for i in 0..10 {
            engine
                .push(i % 3, format!("payload {}", i), f64::from(i as i32), None)
                .unwrap();
        }
        engine.run_gc(4.0).unwrap();
        let head = engine.get_head(0).unwrap();
        engine
            .get_events(0, head.advance(1).unwrap(), true, 4.0, 10)
            .unwrap();

        let expected: Vec<_> = (0..3)
            .map(|q| {
                (
                    engine.get_head(q),
                    engine.get_tail(q),
                    engine.retained(q).cloned().collect::<Vec<_>>(),
                )
            })
            .collect();

        let engine = restart(engine);
        for q in 0..3 {
            let (head, tail, events) = &expected[q as usize];
            assert_eq!(engine.get_head(q), *head);
            assert_eq!(engine.get_tail(q), *tail);
            assert_eq!(&engine.retained(q).cloned().collect::<Vec<_>>(), events);
        }
    }

    #[test]
    fn test_tail_survives_when_everything_was_collected() {
        let mut engine = TQueue::new();
        engine.set_callback(Box::new(TQueueMemoryStorage::new()));
        engine.push(9, "short lived", 1.0, None).unwrap();
        engine.push(9, "short lived", 1.0, None).unwrap();
        engine.run_gc(2.0).unwrap();
        let tail = engine.get_tail(9);

        let mut engine = restart(engine);
        assert_eq!(engine.get_tail(9), tail);
        assert_eq!(engine.get_size(9), 0);
        assert_eq!(engine.push(9, "next", 10.0, None).unwrap(), tail.unwrap());
    }

    #[test]
    fn test_log_stays_bounded_while_events_are_forgotten() {
        let mut engine = TQueue::new();
        engine.set_callback(Box::new(TQueueMemoryStorage::with_compaction_threshold(8)));

        let mut longest = 0;
        for i in 0..200 {
            let id = engine.push(1, format!("{}", i), 100.0, None).unwrap();
            engine.get_events(1, id, true, 0.0, 10).unwrap();
            if i % 10 == 0 {
                engine.push(2, "short lived", 1.0, None).unwrap();
                engine.run_gc(5.0).unwrap();
            }
            let storage = engine
                .extract_callback_as::<TQueueMemoryStorage>()
                .unwrap();
            longest = longest.max(storage.len());
            engine.set_callback(storage);
        }
        assert!(longest <= 8, "log grew to {} ops", longest);

        let head = engine.get_head(1);
        let tail = engine.get_tail(1);
        let other_tail = engine.get_tail(2);
        let engine = restart(engine);
        assert_eq!(engine.get_head(1), head);
        assert_eq!(engine.get_tail(1), tail);
        assert_eq!(engine.get_size(1), 1);
        assert_eq!(engine.get_tail(2), other_tail);
        assert_eq!(engine.get_size(2), 0);
    }

    #[test]
    fn test_compact_keeps_replay_equivalent() {
        let mut engine = TQueue::new();
        engine.set_callback(Box::new(TQueueMemoryStorage::new()));
        for i in 0..20 {
            engine.push(1, format!("{}", i), 100.0, None).unwrap();
        }
        engine.push(2, "gone", 1.0, None).unwrap();
        engine.run_gc(5.0).unwrap();
        engine
            .get_events(1, EventId::from_raw(15).unwrap(), true, 5.0, 100)
            .unwrap();

        let mut storage = engine
            .extract_callback_as::<TQueueMemoryStorage>()
            .unwrap();
        let before = storage.len();
        let result = storage.compact().unwrap();
        assert_eq!(result.entries_before, before);
        assert!(result.entries_after < before);

        let mut replayed = TQueue::new();
        storage.replay(&mut replayed).unwrap();
        for q in [1, 2] {
            assert_eq!(replayed.get_head(q), engine.get_head(q));
            assert_eq!(replayed.get_tail(q), engine.get_tail(q));
            assert_eq!(replayed.get_size(q), engine.get_size(q));
        }
    }
}
