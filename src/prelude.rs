//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use raft_fault_harness::prelude::*;
//! ```

// Core
pub use crate::core::config::HarnessConfig;
pub use crate::core::errors::{Result, RfhError};

// Cluster
pub use crate::cluster::api::{ClusterApiClient, KvOutcome};
pub use crate::cluster::controller::{ClusterController, LeaderRound};
pub use crate::cluster::launcher::{ComposeLauncher, LaunchAction, Launcher};
pub use crate::cluster::node::{Node, NodeStatus, Role};
pub use crate::cluster::sim::SimCluster;
pub use crate::cluster::transport::{HttpResponse, HttpTransport, ReqwestTransport};

// Scenarios and reporting
pub use crate::report::{ReportMeta, Tally};
pub use crate::scenario::{ScenarioContext, ScenarioKind, TestCase, Verdict};

// Harness
pub use crate::harness::{HarnessDriver, RunOptions, RunOutcome, SignalHandler};
pub use crate::logger::EventLog;
