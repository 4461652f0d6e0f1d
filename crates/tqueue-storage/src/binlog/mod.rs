//! Durable append-only binlog
//!
//! - [`Binlog`]: length-prefixed record file with replay on open
//! - [`BinlogRecord`]: postcard body of one frame

mod log;
mod record;

pub use log::{Binlog, BinlogConfig};
pub use record::BinlogRecord;
