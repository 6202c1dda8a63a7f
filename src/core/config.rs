//! Configuration system: TOML file + env var overrides + defaults matching the
//! reference four-node compose deployment.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RfhError};

/// Default config file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rfh.toml";

/// Full harness configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct HarnessConfig {
    pub cluster: ClusterConfig,
    pub timing: TimingConfig,
    pub scenarios: ScenarioConfig,
    pub report: ReportConfig,
    /// Path the config was loaded from (not serialized back).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Static cluster description and launcher invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClusterConfig {
    pub compose_file: PathBuf,
    /// Program plus leading arguments, e.g. `["docker", "compose"]`.
    pub compose_command: Vec<String>,
    pub nodes: Vec<NodeConfig>,
}

/// One declared cluster member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub id: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

/// Settle delays, poll cadence, and per-wait timeouts (all milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub cluster_settle_ms: u64,
    pub node_stop_settle_ms: u64,
    pub node_start_settle_ms: u64,
    pub poll_interval_ms: u64,
    pub status_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub startup_election_timeout_ms: u64,
    pub leader_check_timeout_ms: u64,
    pub reelection_timeout_ms: u64,
    pub unavailable_timeout_ms: u64,
    pub stabilize_ms: u64,
    pub replication_settle_ms: u64,
    pub majority_settle_ms: u64,
    pub recovery_settle_ms: u64,
    pub sync_settle_ms: u64,
    pub follower_settle_ms: u64,
    pub failover_settle_ms: u64,
}

/// Node selection for fault injection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Ordered candidates for "stop a non-leader": first id that is not the
    /// observed leader wins.
    pub stop_preference: Vec<String>,
    pub no_quorum_victims: Vec<String>,
    pub insufficient_quorum_victims: Vec<String>,
    pub persistence_pairs: usize,
}

/// Report and event-log destinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    pub markdown_path: PathBuf,
    pub json_path: Option<PathBuf>,
    pub events_path: PathBuf,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl NodeConfig {
    #[must_use]
    pub fn new(id: &str, host: &str, port: u16) -> Self {
        Self {
            id: id.to_string(),
            host: host.to_string(),
            port,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            compose_file: PathBuf::from("docker-compose.yml"),
            compose_command: vec!["docker-compose".to_string()],
            nodes: (1..=4_u16)
                .map(|i| NodeConfig::new(&format!("node{i}"), "localhost", 9000 + i))
                .collect(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cluster_settle_ms: 10_000,
            node_stop_settle_ms: 2_000,
            node_start_settle_ms: 5_000,
            poll_interval_ms: 1_000,
            status_timeout_ms: 5_000,
            read_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
            startup_election_timeout_ms: 30_000,
            leader_check_timeout_ms: 10_000,
            reelection_timeout_ms: 20_000,
            unavailable_timeout_ms: 10_000,
            stabilize_ms: 5_000,
            replication_settle_ms: 5_000,
            majority_settle_ms: 30_000,
            recovery_settle_ms: 10_000,
            sync_settle_ms: 10_000,
            follower_settle_ms: 15_000,
            failover_settle_ms: 15_000,
        }
    }
}

impl TimingConfig {
    /// Every delay and timeout zeroed except the poll interval, which stays at
    /// one millisecond. Used for simulated runs.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            cluster_settle_ms: 0,
            node_stop_settle_ms: 0,
            node_start_settle_ms: 0,
            poll_interval_ms: 1,
            status_timeout_ms: 0,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            startup_election_timeout_ms: 0,
            leader_check_timeout_ms: 0,
            reelection_timeout_ms: 0,
            unavailable_timeout_ms: 0,
            stabilize_ms: 0,
            replication_settle_ms: 0,
            majority_settle_ms: 0,
            recovery_settle_ms: 0,
            sync_settle_ms: 0,
            follower_settle_ms: 0,
            failover_settle_ms: 0,
        }
    }

    #[must_use]
    pub const fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Self::ms(self.poll_interval_ms)
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            stop_preference: vec!["node4".to_string(), "node3".to_string()],
            no_quorum_victims: vec!["node3".to_string(), "node4".to_string()],
            insufficient_quorum_victims: vec![
                "node2".to_string(),
                "node3".to_string(),
                "node4".to_string(),
            ],
            persistence_pairs: 10,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            markdown_path: PathBuf::from("raft_integration_test_report.md"),
            json_path: None,
            events_path: PathBuf::from("rfh-events.jsonl"),
        }
    }
}

impl HarnessConfig {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| RfhError::io(&path_buf, source))?;
            let mut parsed: Self = toml::from_str(&raw)?;
            parsed.source = Some(path_buf);
            parsed
        } else if path.is_some() {
            return Err(RfhError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic FNV-1a hash of the effective config for the report header.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Look up a declared node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeConfig> {
        self.cluster.nodes.iter().find(|n| n.id == id)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("RFH_COMPOSE_FILE") {
            self.cluster.compose_file = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("RFH_COMPOSE_COMMAND") {
            self.cluster.compose_command = raw.split_whitespace().map(str::to_string).collect();
        }
        if let Some(raw) = lookup("RFH_REPORT_PATH") {
            self.report.markdown_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("RFH_EVENTS_PATH") {
            self.report.events_path = PathBuf::from(raw);
        }

        let timing = &mut self.timing;
        for (name, slot) in [
            ("RFH_POLL_INTERVAL_MS", &mut timing.poll_interval_ms),
            ("RFH_STATUS_TIMEOUT_MS", &mut timing.status_timeout_ms),
            ("RFH_CLUSTER_SETTLE_MS", &mut timing.cluster_settle_ms),
            ("RFH_NODE_STOP_SETTLE_MS", &mut timing.node_stop_settle_ms),
            ("RFH_NODE_START_SETTLE_MS", &mut timing.node_start_settle_ms),
            (
                "RFH_STARTUP_ELECTION_TIMEOUT_MS",
                &mut timing.startup_election_timeout_ms,
            ),
        ] {
            if let Some(raw) = lookup(name) {
                *slot = parse_env_u64(name, &raw)?;
            }
        }

        if let Some(raw) = lookup("RFH_PERSISTENCE_PAIRS") {
            self.scenarios.persistence_pairs =
                usize::try_from(parse_env_u64("RFH_PERSISTENCE_PAIRS", &raw)?).map_err(|e| {
                    RfhError::ConfigParse {
                        context: "env",
                        details: format!("RFH_PERSISTENCE_PAIRS={raw:?}: {e}"),
                    }
                })?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cluster.nodes.is_empty() {
            return Err(invalid("cluster.nodes must declare at least one node"));
        }
        if self.cluster.compose_command.is_empty() {
            return Err(invalid("cluster.compose_command must not be empty"));
        }

        let mut ids = HashSet::new();
        let mut ports = HashSet::new();
        for node in &self.cluster.nodes {
            if node.id.trim().is_empty() {
                return Err(invalid("cluster.nodes: node id must not be empty"));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(invalid(format!("cluster.nodes: duplicate id {}", node.id)));
            }
            if !ports.insert((node.host.as_str(), node.port)) {
                return Err(invalid(format!(
                    "cluster.nodes: duplicate endpoint {}:{}",
                    node.host, node.port
                )));
            }
        }

        for (list, ids_ref) in [
            ("stop_preference", &self.scenarios.stop_preference),
            ("no_quorum_victims", &self.scenarios.no_quorum_victims),
            (
                "insufficient_quorum_victims",
                &self.scenarios.insufficient_quorum_victims,
            ),
        ] {
            if let Some(unknown) = ids_ref.iter().find(|id| !ids.contains(id.as_str())) {
                return Err(invalid(format!(
                    "scenarios.{list} names unknown node {unknown}"
                )));
            }
        }

        let distinct: HashSet<&String> = self.scenarios.stop_preference.iter().collect();
        if distinct.len() < 2 {
            return Err(invalid(
                "scenarios.stop_preference needs at least two distinct node ids",
            ));
        }

        if self.timing.poll_interval_ms == 0 {
            return Err(invalid("timing.poll_interval_ms must be > 0"));
        }
        if self.scenarios.persistence_pairs == 0 {
            return Err(invalid("scenarios.persistence_pairs must be > 0"));
        }

        Ok(())
    }
}

fn invalid(details: impl Into<String>) -> RfhError {
    RfhError::InvalidConfig {
        details: details.into(),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|error| RfhError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
