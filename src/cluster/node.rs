//! Node identity and the typed documents exchanged with cluster nodes.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::config::NodeConfig;

/// One configured cluster member. Immutable for the harness lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// `http://host:port`, no trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn status_url(&self) -> String {
        format!("{}/raft/status", self.base_url())
    }
}

impl From<&NodeConfig> for Node {
    fn from(value: &NodeConfig) -> Self {
        Self::new(value.id.clone(), value.host.clone(), value.port)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.id, self.host, self.port)
    }
}

/// Self-reported node role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Leader,
    Follower,
    Candidate,
    #[serde(other)]
    Other,
}

impl Role {
    #[must_use]
    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Leader => "LEADER",
            Self::Follower => "FOLLOWER",
            Self::Candidate => "CANDIDATE",
            Self::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// `GET /raft/status` body. Fetched fresh on every poll, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub role: Role,
    pub id: String,
    pub term: u64,
}

/// Write and read result body (`/kv/put`, `/kv/delete`, `/kv/get`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvResult {
    pub success: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a 409 "not leader" response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotLeaderBody {
    #[serde(default)]
    pub leader: Option<String>,
}

/// Operation carried in a write body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KvOp {
    Put,
    Delete,
}

/// Request body for `POST /kv/put` and `POST /kv/delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvCommand {
    #[serde(rename = "type")]
    pub op: KvOp,
    pub key: String,
    pub value: Option<String>,
}
