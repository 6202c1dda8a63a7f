#![forbid(unsafe_code)]

//! Raft Fault Harness (rfh): black-box verification of a replicated
//! key-value cluster built on leader election and log replication.
//!
//! The harness never looks inside the consensus implementation. It starts and
//! stops nodes through an external launcher, polls each node's
//! `/raft/status`, reads and writes through `/kv/*`, and checks what a Raft
//! cluster promises from the outside:
//! 1. **Single leader** once a cold cluster converges
//! 2. **Majority progress** with one node down, none without quorum
//! 3. **Durability** of acknowledged writes across leader changes
//! 4. **Catch-up** of nodes that rejoin after missing writes
//!
//! # Library usage
//!
//! ```rust,no_run
//! use raft_fault_harness::prelude::*;
//!
//! let config = HarnessConfig::load(None)?;
//! let driver = HarnessDriver::live(config, EventLog::disabled(), SignalHandler::new())?;
//! let outcome = driver.run(&RunOptions::default())?;
//! assert!(outcome.passed());
//! # Ok::<(), RfhError>(())
//! ```

pub mod prelude;

pub mod cluster;
pub mod core;
pub mod harness;
pub mod logger;
pub mod report;
pub mod scenario;
