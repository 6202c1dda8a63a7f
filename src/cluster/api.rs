//! Key-value client that hides which node is currently leader.
//!
//! Writes rediscover the leader on every call with a linear status probe in
//! configured node order; nothing is cached between calls. Reads go to nodes
//! in configured order and the first 200 decides the outcome.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

use crate::cluster::controller::ClusterController;
use crate::cluster::node::{KvCommand, KvOp, KvResult, Node, NodeStatus, NotLeaderBody};
use crate::cluster::transport::{HttpResponse, HttpTransport};
use crate::core::config::TimingConfig;
use crate::core::errors::{Result, RfhError};

pub const NO_LEADER: &str = "No leader found";
pub const ALL_NODES_UNAVAILABLE: &str = "All nodes unavailable";

/// Application-level outcome of a read or write. Business failures land here
/// with `success == false`; they are never raised as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvOutcome {
    pub success: bool,
    pub value: Option<String>,
    pub message: String,
}

impl KvOutcome {
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            message: message.into(),
        }
    }

    /// True when the call succeeded and returned exactly `expected`.
    #[must_use]
    pub fn has_value(&self, expected: &str) -> bool {
        self.success && self.value.as_deref() == Some(expected)
    }

    /// Value on success, message otherwise.
    #[must_use]
    pub fn detail(&self) -> &str {
        if self.success {
            self.value.as_deref().unwrap_or("")
        } else {
            &self.message
        }
    }

    fn from_write(result: KvResult) -> Self {
        Self {
            success: result.success,
            value: result.value,
            message: result.message.unwrap_or_default(),
        }
    }

    fn from_read(result: KvResult) -> Self {
        if result.success {
            Self {
                success: true,
                value: result.value,
                message: String::new(),
            }
        } else {
            Self::failure(result.message.unwrap_or_default())
        }
    }
}

/// Result of asking one node for a key.
#[derive(Debug)]
enum NodeRead {
    /// The node answered 200; its body decides the outcome.
    Answered(KvOutcome),
    /// Server error, other non-200 status, or transport failure.
    Skipped,
}

#[derive(Clone)]
pub struct ClusterApiClient {
    nodes: Vec<Node>,
    transport: Arc<dyn HttpTransport>,
    status_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl ClusterApiClient {
    #[must_use]
    pub fn new(nodes: Vec<Node>, transport: Arc<dyn HttpTransport>, timing: &TimingConfig) -> Self {
        Self {
            nodes,
            transport,
            status_timeout: TimingConfig::ms(timing.status_timeout_ms),
            read_timeout: TimingConfig::ms(timing.read_timeout_ms),
            write_timeout: TimingConfig::ms(timing.write_timeout_ms),
        }
    }

    /// Client over the same node table and transport as `controller`.
    #[must_use]
    pub fn for_controller(controller: &ClusterController) -> Self {
        Self::new(
            controller.nodes().to_vec(),
            controller.transport(),
            controller.timing(),
        )
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn put(&self, key: &str, value: &str) -> KvOutcome {
        self.write(KvCommand {
            op: KvOp::Put,
            key: key.to_string(),
            value: Some(value.to_string()),
        })
    }

    pub fn delete(&self, key: &str) -> KvOutcome {
        self.write(KvCommand {
            op: KvOp::Delete,
            key: key.to_string(),
            value: None,
        })
    }

    /// Read from nodes in configured order. A 200 with `success == false` stops
    /// the scan.
    pub fn get(&self, key: &str) -> KvOutcome {
        for node in &self.nodes {
            if let NodeRead::Answered(outcome) = self.read_node(node, key) {
                return outcome;
            }
        }
        KvOutcome::failure(ALL_NODES_UNAVAILABLE)
    }

    /// Read from one node only.
    pub fn get_from(&self, node_id: &str, key: &str) -> KvOutcome {
        let Some(node) = self.nodes.iter().find(|n| n.id == node_id) else {
            return KvOutcome::failure(RfhError::UnknownNode { id: node_id.to_string() }.to_string());
        };
        match self.read_node(node, key) {
            NodeRead::Answered(outcome) => outcome,
            NodeRead::Skipped => KvOutcome::failure(format!("{node_id} unavailable")),
        }
    }

    /// First node, in configured order, whose status reports `LEADER`.
    pub fn find_leader(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| {
            self.probe_status(node)
                .is_some_and(|status| status.role.is_leader())
        })
    }

    fn probe_status(&self, node: &Node) -> Option<NodeStatus> {
        let response = self.transport.get(&node.status_url(), self.status_timeout).ok()?;
        if !response.is_ok() {
            return None;
        }
        serde_json::from_str(&response.body).ok()
    }

    fn write(&self, command: KvCommand) -> KvOutcome {
        let Some(leader) = self.find_leader() else {
            return KvOutcome::failure(NO_LEADER);
        };
        let path = match command.op {
            KvOp::Put => "put",
            KvOp::Delete => "delete",
        };
        let url = format!("{}/kv/{path}", leader.base_url());
        match self.post_command(&url, &command) {
            Ok(response) => interpret_write(&url, &response),
            Err(err) => KvOutcome::failure(format!("Request failed: {err}")),
        }
    }

    fn post_command(&self, url: &str, command: &KvCommand) -> Result<HttpResponse> {
        let body = serde_json::to_value(command)?;
        self.transport.post_json(url, &body, self.write_timeout)
    }

    fn read_node(&self, node: &Node, key: &str) -> NodeRead {
        let Ok(url) = read_url(node, key) else {
            return NodeRead::Skipped;
        };
        let Ok(response) = self.transport.get(url.as_str(), self.read_timeout) else {
            return NodeRead::Skipped;
        };
        if !response.is_ok() {
            return NodeRead::Skipped;
        }
        let outcome = match serde_json::from_str::<KvResult>(&response.body) {
            Ok(result) => KvOutcome::from_read(result),
            Err(e) => KvOutcome::failure(RfhError::malformed(url.as_str(), e.to_string()).to_string()),
        };
        NodeRead::Answered(outcome)
    }
}

fn read_url(node: &Node, key: &str) -> Result<Url> {
    let base = format!("{}/kv/get", node.base_url());
    Url::parse_with_params(&base, &[("key", key)]).map_err(|e| RfhError::Runtime {
        details: format!("invalid read url {base}: {e}"),
    })
}

fn interpret_write(url: &str, response: &HttpResponse) -> KvOutcome {
    match response.status {
        200 => match serde_json::from_str::<KvResult>(&response.body) {
            Ok(result) => KvOutcome::from_write(result),
            Err(e) => KvOutcome::failure(RfhError::malformed(url, e.to_string()).to_string()),
        },
        // Known gap: the hint is reported, not followed.
        409 => {
            let body: NotLeaderBody = serde_json::from_str(&response.body).unwrap_or_default();
            match body.leader {
                Some(hint) if !hint.is_empty() => {
                    KvOutcome::failure(format!("Redirected to leader: {hint}"))
                }
                _ => KvOutcome::failure("Not leader response"),
            }
        }
        status => KvOutcome::failure(format!("HTTP {status}: {}", response.body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::launcher::{LaunchAction, Launcher};
    use crate::cluster::sim::SimCluster;

    fn client(sim: &SimCluster) -> ClusterApiClient {
        let nodes = sim.nodes();
        ClusterApiClient::new(nodes, Arc::new(sim.clone()), &TimingConfig::instant())
    }

    fn up(sim: &SimCluster) {
        sim.execute(&LaunchAction::Up).unwrap();
    }

    #[test]
    fn put_without_leader_fails_fast() {
        let sim = SimCluster::four_nodes();
        let api = client(&sim);
        let out = api.put("k", "v");
        assert!(!out.success);
        assert_eq!(out.message, NO_LEADER);
        assert_eq!(api.delete("k").message, NO_LEADER);
    }

    #[test]
    fn put_then_get_round_trips() {
        let sim = SimCluster::four_nodes();
        up(&sim);
        let api = client(&sim);
        assert!(api.put("k1", "v1").success);
        assert!(api.get("k1").has_value("v1"));
        for node in ["node1", "node2", "node3", "node4"] {
            assert!(api.get_from(node, "k1").has_value("v1"), "{node}");
        }
    }

    #[test]
    fn negative_read_stops_the_scan() {
        let sim = SimCluster::four_nodes();
        up(&sim);
        let api = client(&sim);
        let out = api.get("missing");
        assert!(!out.success);
        assert_ne!(out.message, ALL_NODES_UNAVAILABLE);
        assert_eq!(sim.read_requests(), 1);
    }

    #[test]
    fn server_error_skips_to_next_node() {
        let sim = SimCluster::four_nodes();
        up(&sim);
        let api = client(&sim);
        assert!(api.put("k", "v").success);
        sim.fail_reads("node1", true);
        assert!(api.get("k").has_value("v"));
        assert_eq!(sim.read_requests(), 2);
    }

    #[test]
    fn all_down_reads_report_unavailable() {
        let sim = SimCluster::four_nodes();
        let api = client(&sim);
        assert_eq!(api.get("k").message, ALL_NODES_UNAVAILABLE);
    }

    #[test]
    fn delete_removes_key() {
        let sim = SimCluster::four_nodes();
        up(&sim);
        let api = client(&sim);
        assert!(api.put("k", "v").success);
        assert!(api.delete("k").success);
        assert!(!api.get("k").success);
    }

    #[test]
    fn conflict_surfaces_leader_hint_without_retry() {
        let out = interpret_write(
            "http://localhost:9002/kv/put",
            &HttpResponse::new(409, r#"{"leader":"node1"}"#),
        );
        assert_eq!(out, KvOutcome::failure("Redirected to leader: node1"));
        let bare = interpret_write("http://localhost:9002/kv/put", &HttpResponse::new(409, "{}"));
        assert_eq!(bare.message, "Not leader response");
    }

    #[test]
    fn other_status_carries_raw_body() {
        let out = interpret_write(
            "http://localhost:9001/kv/put",
            &HttpResponse::new(503, "busy"),
        );
        assert_eq!(out.message, "HTTP 503: busy");
    }

    #[test]
    fn malformed_write_body_is_distinct() {
        let out = interpret_write(
            "http://localhost:9001/kv/put",
            &HttpResponse::new(200, r#"{"message":"no flag"}"#),
        );
        assert!(!out.success);
        assert!(out.message.contains("RFH-2003"));
    }

    #[test]
    fn read_url_encodes_key() {
        let node = Node::new("node1", "localhost", 9001);
        let url = read_url(&node, "a b&c").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9001/kv/get?key=a+b%26c");
    }

    #[test]
    fn get_from_unknown_node_fails() {
        let sim = SimCluster::four_nodes();
        let api = client(&sim);
        assert!(api.get_from("node9", "k").message.contains("RFH-2001"));
    }
}
