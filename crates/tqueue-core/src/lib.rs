//! # TQueue Core
//!
//! Per-key, append-only event queue engine with pluggable persistence.
//!
//! The same [`TQueue`] engine is used with no persistence, with an
//! in-memory operation recorder, or with a durable append-only log. The
//! storage backends live in `tqueue-storage`; this crate defines the
//! engine and the contract they implement.
//!
//! ## Key Types
//!
//! - [`EventId`]: bounded, validated event identifier
//! - [`Event`]: id, opaque payload and absolute expiration time
//! - [`TQueue`]: the engine (push, cursor reads, forgetting, GC, restart emulation)
//! - [`TQueueCallback`]: persistence observer notified of every mutation
//! - [`TQueueConfig`]: payload/queue limits and first-id policy
//!
//! ## Example
//!
//! ```rust
//! use tqueue_core::{Event, TQueue};
//!
//! let mut queue = TQueue::create();
//! let id = queue.push(12, "hello", 0.0, None).unwrap();
//!
//! let head = queue.get_head(12).unwrap();
//! let mut out = vec![Event::default(); 100];
//! let fetched = queue.get(12, head, true, 0.0, &mut out).unwrap();
//! assert_eq!(fetched.written, 1);
//! assert_eq!(out[0].id, id);
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod event_id;
pub mod queue;
pub mod traits;

// Re-export main types
pub use config::{FirstEventId, TQueueConfig};
pub use error::{StorageError, TQueueError, TQueueResult};
pub use event::{Event, Fetched, QueueId};
pub use event_id::EventId;
pub use queue::TQueue;
pub use traits::{IntoAny, TQueueCallback};
