//! Durable storage adapter
//!
//! [`TQueueBinlog`] mirrors every engine notification into a [`Binlog`] as
//! a [`BinlogRecord`]. On startup the log is replayed into a fresh engine
//! through [`TQueueBinlog::replay`], after which the adapter is bound to the
//! log and attached as the engine's callback.

use std::path::Path;

use tracing::{debug, info, instrument};

use tqueue_core::{
    Event, EventId, QueueId, StorageError, TQueue, TQueueCallback, TQueueConfig, TQueueResult,
};

use crate::binlog::{Binlog, BinlogConfig, BinlogRecord};
use crate::compaction::{self, CompactionResult};
use crate::op::QueueOp;

/// Binlog-backed implementation of [`TQueueCallback`]
///
/// Until [`set_binlog`](Self::set_binlog) is called every notification
/// fails with [`StorageError::NotBound`].
#[derive(Debug, Default)]
pub struct TQueueBinlog {
    binlog: Option<Binlog>,
}

impl TQueueBinlog {
    /// Create an adapter with no log bound
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the log that receives future records, returning the previous one
    pub fn set_binlog(&mut self, binlog: Binlog) -> Option<Binlog> {
        self.binlog.replace(binlog)
    }

    /// The bound log, if any
    pub fn binlog(&self) -> Option<&Binlog> {
        self.binlog.as_ref()
    }

    /// Unbind and return the log
    pub fn take_binlog(&mut self) -> Option<Binlog> {
        self.binlog.take()
    }

    /// Decode one stored record and apply it to `target`
    pub fn replay(&self, raw: &[u8], target: &mut TQueue) -> TQueueResult<()> {
        let record = BinlogRecord::decode(raw)?;
        record.op.apply(target)
    }

    /// Restore an engine from the log at `path`
    ///
    /// Creates the log if it does not exist. The returned engine has a bound
    /// adapter attached and continues ids where the log left off.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(
        path: impl AsRef<Path>,
        binlog_config: BinlogConfig,
        engine_config: TQueueConfig,
    ) -> TQueueResult<TQueue> {
        let mut engine = TQueue::with_config(engine_config)?;
        let mut adapter = Self::new();

        let binlog = Binlog::init(path, binlog_config, |raw| adapter.replay(raw, &mut engine))?;
        let records = binlog.record_count();
        adapter.set_binlog(binlog);

        info!(
            records,
            queues = engine.queue_count(),
            "Restored queue engine from binlog"
        );
        engine.set_callback(Box::new(adapter));
        Ok(engine)
    }

    /// Rewrite the bound log so it holds only what a replay still needs
    pub fn compact(&mut self) -> TQueueResult<CompactionResult> {
        let binlog = self.binlog.as_mut().ok_or(StorageError::NotBound)?;

        let mut ops = Vec::new();
        binlog.for_each_record(|raw| {
            ops.push(BinlogRecord::decode(raw)?.op);
            Ok::<(), StorageError>(())
        })?;

        let folded = compaction::fold(&ops)?;
        let records = folded
            .into_iter()
            .map(|op| BinlogRecord::new(op).encode())
            .collect::<Result<Vec<_>, _>>()?;
        let result = CompactionResult::new(ops.len(), records.len());
        binlog.rewrite(records)?;

        debug!(
            before = result.entries_before,
            after = result.entries_after,
            size = binlog.size_bytes(),
            "Compacted binlog"
        );
        Ok(result)
    }

    fn append(&mut self, op: QueueOp) -> Result<(), StorageError> {
        let binlog = self.binlog.as_mut().ok_or(StorageError::NotBound)?;
        let raw = BinlogRecord::new(op).encode()?;
        binlog.append(&raw)
    }
}

impl TQueueCallback for TQueueBinlog {
    fn on_push(&mut self, queue_id: QueueId, event: &Event) -> Result<(), StorageError> {
        self.append(QueueOp::Push {
            queue_id,
            event: event.clone(),
        })
    }

    fn on_forget(&mut self, queue_id: QueueId, up_to: EventId) -> Result<(), StorageError> {
        self.append(QueueOp::Forget { queue_id, up_to })
    }

    fn on_pop(&mut self, queue_id: QueueId, event_id: EventId) -> Result<(), StorageError> {
        self.append(QueueOp::Pop { queue_id, event_id })
    }
}
