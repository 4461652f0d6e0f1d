//! # TQueue Storage
//!
//! Persistence adapters for the [`TQueue`](tqueue_core::TQueue) engine.
//!
//! Both adapters implement [`TQueueCallback`](tqueue_core::TQueueCallback)
//! and record every mutation as a [`QueueOp`]. After a restart the recorded
//! operations are replayed into a fresh engine.
//!
//! ## Features
//!
//! - **TQueueMemoryStorage**: keeps the operation log in memory, for tests and simulation
//! - **TQueueBinlog**: writes the operation log to a durable [`Binlog`]
//! - **Binlog**: length-prefixed append-only file with replay on open and atomic rewrite
//! - **Compaction**: folds an operation log down to what a replay still needs
//!
//! ## Example
//!
//! ```rust
//! use tqueue_core::TQueueConfig;
//! use tqueue_storage::{BinlogConfig, TQueueBinlog};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("tqueue.binlog");
//!
//! let mut engine = TQueueBinlog::open(&path, BinlogConfig::default(), TQueueConfig::default()).unwrap();
//! let id = engine.push(1, "hello", 100.0, None).unwrap();
//!
//! engine.emulate_restart();
//! drop(engine);
//!
//! let engine = TQueueBinlog::open(&path, BinlogConfig::default(), TQueueConfig::default()).unwrap();
//! assert_eq!(engine.get_head(1), Some(id));
//! ```

pub mod binlog;
pub mod compaction;
pub mod memory;
pub mod op;
pub mod tqueue_binlog;

// Re-exports
pub use binlog::{Binlog, BinlogConfig, BinlogRecord};
pub use compaction::CompactionResult;
pub use memory::TQueueMemoryStorage;
pub use op::QueueOp;
pub use tqueue_binlog::TQueueBinlog;
