//! Binlog record encoding

use serde::{Deserialize, Serialize};

use tqueue_core::StorageError;

use crate::op::QueueOp;

/// One queue mutation as stored in the binlog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinlogRecord {
    /// Timestamp when the record was logged
    pub logged_at_millis: i64,
    /// The recorded mutation
    pub op: QueueOp,
}

impl BinlogRecord {
    /// Create a new record stamped with the current time
    pub fn new(op: QueueOp) -> Self {
        Self {
            logged_at_millis: chrono::Utc::now().timestamp_millis(),
            op,
        }
    }

    /// Serialize to the postcard body stored inside a binlog frame
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|e| StorageError::serialization(e.to_string()))
    }

    /// Parse a binlog frame body
    pub fn decode(raw: &[u8]) -> Result<Self, StorageError> {
        Ok(postcard::from_bytes(raw)?)
    }
}
