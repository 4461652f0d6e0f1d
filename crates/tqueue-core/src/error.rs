//! Error types for the queue engine and its storage callbacks

use thiserror::Error;

use crate::event::QueueId;
use crate::event_id::EventId;

/// Errors returned by [`TQueue`](crate::TQueue) operations
#[derive(Debug, Error)]
pub enum TQueueError {
    #[error("Invalid event id: {0} is outside [{min}, {max}]", min = EventId::MIN_ID, max = EventId::MAX_ID)]
    InvalidEventId(i64),

    #[error("Out of order push to queue {queue_id}: id {requested} is before tail {tail}")]
    OutOfOrderPush {
        queue_id: QueueId,
        requested: EventId,
        tail: EventId,
    },

    #[error("Output buffer too small: {available} readable event(s) did not fit")]
    BufferTooSmall { available: usize },

    #[error("Event payload is empty")]
    EmptyPayload,

    #[error("Event payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Queue {queue_id} is full ({max} events)")]
    QueueFull { queue_id: QueueId, max: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by persistence callbacks and the durable log
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    #[error("No durable log bound to the storage adapter")]
    NotBound,
}

impl StorageError {
    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new CorruptRecord error
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

/// Result type alias for queue operations
pub type TQueueResult<T> = Result<T, TQueueError>;
