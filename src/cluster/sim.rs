//! In-memory simulated cluster for deterministic tests and `rfh run --simulate`.
//!
//! [`SimCluster`] implements both [`Launcher`] and [`HttpTransport`], so the
//! controller and the API client drive it exactly as they drive real nodes.
//! The model is deliberately coarse: a leader exists only while a majority of
//! nodes is up, writes through the leader reach every running node at once,
//! and a node that rejoins copies the leader's store. Fault switches break
//! each of those guarantees on demand.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Url;
use serde_json::{Value, json};

use crate::cluster::launcher::{LaunchAction, Launcher};
use crate::cluster::node::{KvCommand, KvOp, Node, NodeStatus, Role};
use crate::cluster::transport::{HttpResponse, HttpTransport};
use crate::core::config::ClusterConfig;
use crate::core::errors::{Result, RfhError};

#[derive(Debug)]
struct SimNode {
    node: Node,
    up: bool,
    store: BTreeMap<String, String>,
    applied: u64,
    corrupt_status: bool,
    fail_reads: bool,
    ignore_stop: bool,
    frozen: bool,
}

#[derive(Debug, Default)]
struct SimState {
    nodes: Vec<SimNode>,
    leader: Option<usize>,
    extra_leader: Option<usize>,
    term: u64,
    reject_launches: bool,
    quorum_override: Option<usize>,
    drop_on_failover: Option<String>,
    history: Vec<LaunchAction>,
    read_requests: usize,
}

impl SimState {
    fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.node.id == id)
    }

    fn quorum(&self) -> usize {
        self.quorum_override.unwrap_or(self.nodes.len() / 2 + 1)
    }

    /// Re-derive leadership after a membership change and resync running nodes.
    fn reconcile(&mut self) {
        let up_count = self.nodes.iter().filter(|n| n.up).count();
        let next = if up_count < self.quorum() {
            None
        } else if let Some(current) = self.leader.filter(|&i| self.nodes[i].up) {
            Some(current)
        } else {
            let mut best: Option<usize> = None;
            for (i, n) in self.nodes.iter().enumerate().filter(|(_, n)| n.up) {
                if best.is_none_or(|b| n.applied > self.nodes[b].applied) {
                    best = Some(i);
                }
            }
            best
        };
        if let Some(new) = next
            && next != self.leader
        {
            self.term += 1;
            if self.leader.is_some()
                && let Some(key) = &self.drop_on_failover
            {
                self.nodes[new].store.remove(key);
            }
        }
        self.leader = next;

        if let Some(leader) = self.leader {
            let store = self.nodes[leader].store.clone();
            let applied = self.nodes[leader].applied;
            for n in self.nodes.iter_mut().filter(|n| n.up && !n.frozen) {
                n.store.clone_from(&store);
                n.applied = applied;
            }
        }
    }

    fn apply(&mut self, action: &LaunchAction) -> Result<()> {
        self.extra_leader = None;
        match action {
            LaunchAction::Up => {
                for n in &mut self.nodes {
                    n.up = true;
                }
            }
            LaunchAction::Down => {
                for n in &mut self.nodes {
                    n.up = false;
                    n.store.clear();
                    n.applied = 0;
                }
                self.leader = None;
                self.term = 0;
            }
            LaunchAction::StopNode(id) | LaunchAction::StartNode(id) => {
                let i = self
                    .index_of(id)
                    .ok_or_else(|| RfhError::UnknownNode { id: id.clone() })?;
                let node = &mut self.nodes[i];
                if matches!(action, LaunchAction::StartNode(_)) {
                    node.up = true;
                } else if !node.ignore_stop {
                    node.up = false;
                }
            }
        }
        self.reconcile();
        Ok(())
    }

    fn route(&self, url: &str) -> Result<(usize, Url)> {
        let parsed = Url::parse(url).map_err(|e| RfhError::Transport {
            endpoint: url.to_string(),
            details: format!("invalid url: {e}"),
        })?;
        let host = parsed.host_str().unwrap_or_default();
        let port = parsed.port_or_known_default().unwrap_or_default();
        let index = self
            .nodes
            .iter()
            .position(|n| n.node.host == host && n.node.port == port)
            .filter(|&i| self.nodes[i].up)
            .ok_or_else(|| RfhError::Transport {
                endpoint: url.to_string(),
                details: "connect: connection refused".to_string(),
            })?;
        Ok((index, parsed))
    }

    fn role_of(&self, i: usize) -> Role {
        if self.leader == Some(i) || self.extra_leader == Some(i) {
            Role::Leader
        } else if self.leader.is_some() {
            Role::Follower
        } else {
            Role::Candidate
        }
    }

    fn status(&self, i: usize) -> HttpResponse {
        let node = &self.nodes[i];
        if node.corrupt_status {
            return HttpResponse::new(200, json!({ "id": node.node.id }).to_string());
        }
        let status = NodeStatus {
            role: self.role_of(i),
            id: node.node.id.clone(),
            term: self.term,
        };
        HttpResponse::new(200, serde_json::to_string(&status).unwrap_or_default())
    }

    fn read(&mut self, i: usize, url: &Url) -> HttpResponse {
        self.read_requests += 1;
        let node = &self.nodes[i];
        if node.fail_reads {
            return HttpResponse::new(500, "internal error");
        }
        let key = url
            .query_pairs()
            .find(|(k, _)| k == "key")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let body = match node.store.get(&key) {
            Some(value) => json!({ "success": true, "value": value }),
            None => json!({ "success": false, "message": format!("Key not found: {key}") }),
        };
        HttpResponse::new(200, body.to_string())
    }

    fn write(&mut self, i: usize, body: &Value) -> HttpResponse {
        if self.leader != Some(i) {
            let hint = self.leader.map(|l| self.nodes[l].node.id.clone());
            return HttpResponse::new(409, json!({ "leader": hint }).to_string());
        }
        let Ok(command) = serde_json::from_value::<KvCommand>(body.clone()) else {
            return HttpResponse::new(400, "bad command");
        };
        let leader = &mut self.nodes[i];
        let result = match command.op {
            KvOp::Put => {
                leader
                    .store
                    .insert(command.key, command.value.unwrap_or_default());
                json!({ "success": true, "message": "Command applied" })
            }
            KvOp::Delete => {
                if leader.store.remove(&command.key).is_some() {
                    json!({ "success": true, "message": "Command applied" })
                } else {
                    json!({ "success": false, "message": "Key not found" })
                }
            }
        };
        leader.applied += 1;
        self.reconcile();
        HttpResponse::new(200, result.to_string())
    }
}

/// Shared handle to one simulated cluster. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct SimCluster {
    state: Arc<Mutex<SimState>>,
}

impl SimCluster {
    /// A stopped cluster over `nodes`.
    #[must_use]
    pub fn new(nodes: Vec<Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|node| SimNode {
                node,
                up: false,
                store: BTreeMap::new(),
                applied: 0,
                corrupt_status: false,
                fail_reads: false,
                ignore_stop: false,
                frozen: false,
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(SimState {
                nodes,
                ..SimState::default()
            })),
        }
    }

    #[must_use]
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self::new(config.nodes.iter().map(Node::from).collect())
    }

    /// The default four-node cluster on `localhost:9001..9004`, stopped.
    #[must_use]
    pub fn four_nodes() -> Self {
        Self::from_config(&ClusterConfig::default())
    }

    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.state.lock().nodes.iter().map(|n| n.node.clone()).collect()
    }

    #[must_use]
    pub fn leader(&self) -> Option<String> {
        let state = self.state.lock();
        state.leader.map(|i| state.nodes[i].node.id.clone())
    }

    #[must_use]
    pub fn term(&self) -> u64 {
        self.state.lock().term
    }

    #[must_use]
    pub fn is_up(&self, id: &str) -> bool {
        let state = self.state.lock();
        state.index_of(id).is_some_and(|i| state.nodes[i].up)
    }

    /// Every launcher request received so far, in order.
    #[must_use]
    pub fn launch_history(&self) -> Vec<LaunchAction> {
        self.state.lock().history.clone()
    }

    /// Number of `/kv/get` requests that reached a running node.
    #[must_use]
    pub fn read_requests(&self) -> usize {
        self.state.lock().read_requests
    }

    /// Make the launcher reject every request.
    pub fn reject_launches(&self, reject: bool) {
        self.state.lock().reject_launches = reject;
    }

    /// Have `id` also self-report `LEADER` until the next launcher action.
    pub fn force_extra_leader(&self, id: &str) {
        let mut state = self.state.lock();
        state.extra_leader = state.index_of(id);
    }

    /// Serve a status body without the `role` field.
    pub fn corrupt_status(&self, id: &str, corrupt: bool) {
        self.with_node(id, |n| n.corrupt_status = corrupt);
    }

    /// Answer `/kv/get` with HTTP 500.
    pub fn fail_reads(&self, id: &str, fail: bool) {
        self.with_node(id, |n| n.fail_reads = fail);
    }

    /// Nodes that must be up for a leader to exist, replacing the majority.
    /// `1` lets a minority keep a leader; the cluster size demands unanimity.
    pub fn override_quorum(&self, size: usize) {
        self.state.lock().quorum_override = Some(size);
    }

    /// Accept stop requests for `id` without stopping it.
    pub fn ignore_stop(&self, id: &str, ignore: bool) {
        self.with_node(id, |n| n.ignore_stop = ignore);
    }

    /// Remove `key` from the new leader whenever leadership moves away from a
    /// lost leader, so a committed write disappears across the failover.
    pub fn drop_key_on_failover(&self, key: &str) {
        self.state.lock().drop_on_failover = Some(key.to_string());
    }

    /// Stop replicating to `id`; it keeps whatever it had, even after rejoining.
    pub fn freeze(&self, id: &str, frozen: bool) {
        self.with_node(id, |n| n.frozen = frozen);
    }

    fn with_node(&self, id: &str, f: impl FnOnce(&mut SimNode)) {
        let mut state = self.state.lock();
        if let Some(i) = state.index_of(id) {
            f(&mut state.nodes[i]);
        }
    }
}

impl Launcher for SimCluster {
    fn execute(&self, action: &LaunchAction) -> Result<()> {
        let mut state = self.state.lock();
        state.history.push(action.clone());
        if state.reject_launches {
            return Err(RfhError::Launcher {
                action: action.to_string(),
                details: "simulated launcher rejected the request".to_string(),
            });
        }
        state.apply(action)
    }
}

impl HttpTransport for SimCluster {
    fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse> {
        let mut state = self.state.lock();
        let (i, parsed) = state.route(url)?;
        match parsed.path() {
            "/raft/status" => Ok(state.status(i)),
            "/kv/get" => Ok(state.read(i, &parsed)),
            _ => Ok(HttpResponse::new(404, "not found")),
        }
    }

    fn post_json(&self, url: &str, body: &Value, _timeout: Duration) -> Result<HttpResponse> {
        let mut state = self.state.lock();
        let (i, parsed) = state.route(url)?;
        match parsed.path() {
            "/kv/put" | "/kv/delete" => Ok(state.write(i, body)),
            _ => Ok(HttpResponse::new(404, "not found")),
        }
    }
}
