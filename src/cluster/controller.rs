//! Cluster lifecycle control and status observation.
//!
//! Launcher failures come back as `false` and are logged here; nothing in this
//! module returns an error for a node being down. Waits are plain blocking
//! poll loops with a fixed interval and an overall deadline.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::cluster::launcher::{LaunchAction, Launcher};
use crate::cluster::node::{Node, NodeStatus};
use crate::cluster::transport::HttpTransport;
use crate::core::config::{HarnessConfig, TimingConfig};
use crate::core::errors::{Result, RfhError};
use crate::logger::{EventLog, EventType, LogEntry, Severity};

/// Leader roles observed in one poll round across all configured nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderRound {
    /// No node reported `LEADER`.
    None,
    /// Exactly one node reported `LEADER`.
    Single(String),
    /// More than one node reported `LEADER` in the same round.
    Split(Vec<String>),
}

impl LeaderRound {
    /// Classify the ids of nodes that self-reported `LEADER` in one round.
    #[must_use]
    pub fn from_leaders(mut leaders: Vec<String>) -> Self {
        match leaders.len() {
            0 => Self::None,
            1 => Self::Single(leaders.remove(0)),
            _ => Self::Split(leaders),
        }
    }

    /// The elected leader, if the round is unambiguous.
    #[must_use]
    pub fn leader(&self) -> Option<&str> {
        match self {
            Self::Single(id) => Some(id),
            Self::None | Self::Split(_) => None,
        }
    }
}

/// Starts and stops nodes through the launcher and observes them over HTTP.
#[derive(Clone)]
pub struct ClusterController {
    nodes: Vec<Node>,
    launcher: Arc<dyn Launcher>,
    transport: Arc<dyn HttpTransport>,
    timing: TimingConfig,
    events: EventLog,
}

impl ClusterController {
    #[must_use]
    pub fn new(
        nodes: Vec<Node>,
        launcher: Arc<dyn Launcher>,
        transport: Arc<dyn HttpTransport>,
        timing: TimingConfig,
        events: EventLog,
    ) -> Self {
        Self {
            nodes,
            launcher,
            transport,
            timing,
            events,
        }
    }

    #[must_use]
    pub fn from_config(
        config: &HarnessConfig,
        launcher: Arc<dyn Launcher>,
        transport: Arc<dyn HttpTransport>,
        events: EventLog,
    ) -> Self {
        let nodes = config.cluster.nodes.iter().map(Node::from).collect();
        Self::new(nodes, launcher, transport, config.timing.clone(), events)
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    #[must_use]
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    #[must_use]
    pub const fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    #[must_use]
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ──────────────────── lifecycle ────────────────────

    /// Bring up every declared node, then block for the cluster settle delay.
    pub fn start_cluster(&self) -> bool {
        self.run_action(&LaunchAction::Up, None, self.timing.cluster_settle_ms)
    }

    /// Tear down every node. Safe to call when the cluster is already down.
    pub fn stop_cluster(&self) -> bool {
        self.run_action(&LaunchAction::Down, None, 0)
    }

    pub fn stop_node(&self, id: &str) -> bool {
        if !self.check_known(id, "stop") {
            return false;
        }
        self.run_action(
            &LaunchAction::StopNode(id.to_string()),
            Some(id),
            self.timing.node_stop_settle_ms,
        )
    }

    pub fn start_node(&self, id: &str) -> bool {
        if !self.check_known(id, "start") {
            return false;
        }
        self.run_action(
            &LaunchAction::StartNode(id.to_string()),
            Some(id),
            self.timing.node_start_settle_ms,
        )
    }

    fn check_known(&self, id: &str, verb: &str) -> bool {
        if self.node(id).is_some() {
            return true;
        }
        let err = RfhError::UnknownNode { id: id.to_string() };
        report_error(&format!("cannot {verb} node"), &err);
        self.events.emit(
            &LogEntry::new(EventType::ClusterAction, Severity::Warning)
                .node(id)
                .ok(false)
                .error(&err),
        );
        false
    }

    fn run_action(&self, action: &LaunchAction, node: Option<&str>, settle_ms: u64) -> bool {
        let outcome = self.launcher.execute(action);
        let mut entry = match &outcome {
            Ok(()) => LogEntry::new(EventType::ClusterAction, Severity::Info)
                .ok(true)
                .details(action.to_string()),
            Err(err) => {
                report_error(&format!("failed to {action}"), err);
                LogEntry::new(EventType::ClusterAction, Severity::Warning)
                    .ok(false)
                    .error(err)
            }
        };
        if let Some(id) = node {
            entry = entry.node(id);
        }
        self.events.emit(&entry);

        if outcome.is_err() {
            return false;
        }
        sleep_ms(settle_ms);
        true
    }

    // ──────────────────── observation ────────────────────

    /// Fetch one node's status, keeping the failure reason.
    pub fn fetch_status(&self, node: &Node) -> Result<NodeStatus> {
        let url = node.status_url();
        let response = self
            .transport
            .get(&url, TimingConfig::ms(self.timing.status_timeout_ms))?;
        if !response.is_ok() {
            return Err(RfhError::UnexpectedStatus {
                endpoint: url,
                status: response.status,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| RfhError::malformed(url, e.to_string()))
    }

    /// Status of a node, or `None` when it does not answer with a usable 200.
    pub fn node_status(&self, id: &str) -> Option<NodeStatus> {
        let node = self.node(id)?;
        match self.fetch_status(node) {
            Ok(status) => Some(status),
            Err(err @ RfhError::MalformedResponse { .. }) => {
                self.events.emit(
                    &LogEntry::new(EventType::StatusMalformed, Severity::Warning)
                        .node(id)
                        .error(&err),
                );
                None
            }
            Err(_) => None,
        }
    }

    /// Every configured node paired with its current status.
    pub fn snapshot(&self) -> Vec<(Node, Option<NodeStatus>)> {
        self.nodes
            .iter()
            .map(|node| (node.clone(), self.node_status(&node.id)))
            .collect()
    }

    /// Poll every node once and classify the self-reported leaders.
    pub fn poll_leaders(&self) -> LeaderRound {
        let leaders = self
            .nodes
            .iter()
            .filter_map(|node| self.node_status(&node.id))
            .filter(|status| status.role.is_leader())
            .map(|status| status.id)
            .collect();
        LeaderRound::from_leaders(leaders)
    }

    /// Wait until exactly one node reports `LEADER` in a single round.
    ///
    /// A round with several leaders counts as "not found" and is recorded as a
    /// `leader_conflict` event.
    pub fn wait_for_leader_election(&self, timeout: Duration) -> Option<String> {
        poll_until(timeout, self.timing.poll_interval(), || {
            match self.poll_leaders() {
                LeaderRound::Single(id) => Some(id),
                LeaderRound::Split(ids) => {
                    self.events.emit(
                        &LogEntry::new(EventType::LeaderConflict, Severity::Critical)
                            .details(format!("multiple leaders in one round: {}", ids.join(", "))),
                    );
                    None
                }
                LeaderRound::None => None,
            }
        })
    }

    /// Wait until a node stops answering its status endpoint.
    pub fn wait_for_node_unavailable(&self, id: &str, timeout: Duration) -> bool {
        poll_until(timeout, self.timing.poll_interval(), || {
            self.node_status(id).is_none().then_some(())
        })
        .is_some()
    }
}

/// Bounded repeated sampling: call `probe` until it yields a value or the
/// deadline passes. `probe` always runs at least once.
pub fn poll_until<T>(
    timeout: Duration,
    interval: Duration,
    mut probe: impl FnMut() -> Option<T>,
) -> Option<T> {
    let start = Instant::now();
    loop {
        if let Some(value) = probe() {
            return Some(value);
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return None;
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}

/// Blocking settle delay; zero is a no-op.
pub fn sleep_ms(ms: u64) {
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

fn report_error(context: &str, err: &RfhError) {
    let _ = writeln!(io::stderr(), "[RFH-CLUSTER] {context}: {err}");
}
