//! # TQueue Simulation
//!
//! A deterministic oracle harness for the TQueue engine.
//!
//! ## Overview
//!
//! The same engine runs in three flavours that must be indistinguishable
//! from the outside:
//!
//! - **Baseline**: no persistence, never loses state
//! - **Memory**: mirrored into `TQueueMemoryStorage`, rebuilt by replay on restart
//! - **Binlog**: mirrored into a durable `TQueueBinlog`, reopened from disk on restart
//!
//! ## Architecture
//!
//! - **Simulation** (`simulation.rs`): the [`Harness`], its [`SimConfig`] and [`SimStats`]
//! - **Scenarios** (`scenarios.rs`): the hands walkthrough, crash recovery, GC and random runs
//!
//! ## Example
//!
//! ```rust
//! use tqueue_simulation::{Harness, SimConfig};
//!
//! let mut harness = Harness::new(SimConfig {
//!     seed: 7,
//!     steps: 500,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let stats = harness.run().unwrap();
//! assert_eq!(stats.steps, 500);
//! ```

pub mod scenarios;
pub mod simulation;

pub use scenarios::*;
pub use simulation::{Harness, SimConfig, SimError, SimStats};
