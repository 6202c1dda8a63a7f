//! The fault-injection scenarios, in their fixed execution order.
//!
//! Each scenario logs every step through its [`TestCase`] and returns a
//! verdict. Scenarios never call `finish`; the runner does that exactly once.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use crate::core::errors::{Result, RfhError};
use crate::scenario::context::ScenarioContext;
use crate::scenario::test_case::{TestCase, Verdict};

/// Identifies one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScenarioKind {
    StartupAndLeaderElection,
    DataReplication,
    MajoritySurvival,
    EdgeCaseNoQuorum,
    InsufficientQuorum,
    LeaderFailure,
    LeaderReturn,
    FollowerReturn,
    DataPersistence,
}

impl ScenarioKind {
    /// Execution order. Later scenarios assume the cluster state earlier ones
    /// leave behind.
    pub const ALL: [Self; 9] = [
        Self::StartupAndLeaderElection,
        Self::DataReplication,
        Self::MajoritySurvival,
        Self::EdgeCaseNoQuorum,
        Self::InsufficientQuorum,
        Self::LeaderFailure,
        Self::LeaderReturn,
        Self::FollowerReturn,
        Self::DataPersistence,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StartupAndLeaderElection => "startup_and_leader_election",
            Self::DataReplication => "data_replication",
            Self::MajoritySurvival => "majority_survival",
            Self::EdgeCaseNoQuorum => "edge_case_no_quorum",
            Self::InsufficientQuorum => "insufficient_quorum",
            Self::LeaderFailure => "leader_failure",
            Self::LeaderReturn => "leader_return",
            Self::FollowerReturn => "follower_return",
            Self::DataPersistence => "data_persistence",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::StartupAndLeaderElection => "Cluster startup and leader election",
            Self::DataReplication => "Replication of leader writes to every follower",
            Self::MajoritySurvival => "Cluster keeps working with 1 of 4 nodes down",
            Self::EdgeCaseNoQuorum => "Cluster refuses service without quorum (2 of 4 nodes down)",
            Self::InsufficientQuorum => {
                "Cluster refuses service with fewer than half the nodes (1 of 4 up)"
            }
            Self::LeaderFailure => "A new leader is elected when the leader becomes unavailable",
            Self::LeaderReturn => "A returning former leader synchronizes with the cluster state",
            Self::FollowerReturn => "A returning follower synchronizes with the cluster state",
            Self::DataPersistence => "Data stays intact and available across a leader change",
        }
    }

    /// Run the scenario body. An `Err` is converted to `FAILED` by the runner.
    pub fn run(self, ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
        match self {
            Self::StartupAndLeaderElection => startup_and_leader_election(ctx, tc),
            Self::DataReplication => data_replication(ctx, tc),
            Self::MajoritySurvival => majority_survival(ctx, tc),
            Self::EdgeCaseNoQuorum => {
                quorum_loss(ctx, tc, &ctx.scenarios.no_quorum_victims, "no quorum", true)
            }
            Self::InsufficientQuorum => quorum_loss(
                ctx,
                tc,
                &ctx.scenarios.insufficient_quorum_victims,
                "insufficient quorum",
                false,
            ),
            Self::LeaderFailure => leader_failure(ctx, tc),
            Self::LeaderReturn => leader_return(ctx, tc),
            Self::FollowerReturn => follower_return(ctx, tc),
            Self::DataPersistence => data_persistence(ctx, tc),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = RfhError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| RfhError::InvalidConfig {
                details: format!("unknown scenario '{s}'"),
            })
    }
}

// ──────────────────── helpers ────────────────────

fn fail(tc: &mut TestCase, message: impl fmt::Display) -> Result<Verdict> {
    tc.log(format!("ERROR: {message}"));
    Ok(Verdict::Failed)
}

/// Leader check that opens most scenarios.
fn require_leader(ctx: &ScenarioContext, tc: &mut TestCase, missing: &str) -> Option<String> {
    let leader = ctx.leader_within(ctx.timing().leader_check_timeout_ms);
    if leader.is_none() {
        tc.log(format!("ERROR: {missing}"));
    }
    leader
}

/// Put one pair, logging an error with `context` on failure.
fn put_or_log(ctx: &ScenarioContext, tc: &mut TestCase, key: &str, value: &str, context: &str) -> bool {
    let outcome = ctx.api.put(key, value);
    if !outcome.success {
        tc.log(format!("ERROR: {context}: {}", outcome.message));
    }
    outcome.success
}

/// Cluster-wide read of every pair, then a direct read from `node`.
fn verify_synchronized(
    ctx: &ScenarioContext,
    tc: &mut TestCase,
    node: &str,
    label: &str,
    pairs: &[(&str, &str)],
) -> bool {
    for &(key, expected) in pairs {
        let outcome = ctx.api.get(key);
        if !outcome.has_value(expected) {
            tc.log(format!(
                "ERROR: {label} {node} not synchronized: {key} expected '{expected}', got '{}'",
                outcome.detail()
            ));
            return false;
        }
    }
    for &(key, expected) in pairs {
        let outcome = ctx.node_serves(node, key, expected, ctx.timing().sync_settle_ms);
        if !outcome.has_value(expected) {
            tc.log(format!(
                "ERROR: {label} {node} does not serve {key} itself: expected '{expected}', got '{}'",
                outcome.detail()
            ));
            return false;
        }
    }
    true
}

// ──────────────────── scenarios ────────────────────

fn startup_and_leader_election(ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
    tc.log("Starting cluster...");
    if !ctx.controller.start_cluster() {
        return fail(tc, "Failed to start cluster");
    }
    tc.log("Cluster started, waiting for leader election...");

    let Some(leader) = ctx.leader_within(ctx.timing().startup_election_timeout_ms) else {
        return fail(tc, "Leader election failed - no leader elected within timeout");
    };
    tc.log(format!("SUCCESS: Leader elected - {leader}"));

    for (node, status) in ctx.controller.snapshot() {
        match status {
            Some(s) => tc.log(format!("Node {}: role={}, term={}", node.id, s.role, s.term)),
            None => tc.log(format!("WARNING: Node {} is not responding", node.id)),
        }
    }
    Ok(Verdict::Passed)
}

fn data_replication(ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
    let Some(leader) = require_leader(ctx, tc, "No leader found") else {
        return Ok(Verdict::Failed);
    };
    tc.log(format!("Current leader: {leader}"));

    let pairs = [
        ("test_key_1", "test_value_1"),
        ("test_key_2", "test_value_2"),
        ("test_key_3", "test_value_3"),
    ];
    for (key, value) in pairs {
        let outcome = ctx.api.put(key, value);
        if !outcome.success {
            return fail(tc, format!("Failed to put {key}={value}: {}", outcome.message));
        }
        tc.log(format!("SUCCESS: Put {key}={value}"));
    }

    ctx.settle(ctx.timing().replication_settle_ms);

    let mut consistent = true;
    for (key, expected) in pairs {
        for node in ctx.controller.node_ids() {
            let outcome = ctx.api.get_from(&node, key);
            if outcome.has_value(expected) {
                tc.log(format!("SUCCESS: Node {node} has correct value for {key}"));
            } else {
                tc.log(format!(
                    "ERROR: Node {node} has incorrect value for {key}: expected '{expected}', got '{}'",
                    outcome.detail()
                ));
                consistent = false;
            }
        }
    }
    Ok(if consistent {
        Verdict::Passed
    } else {
        Verdict::Failed
    })
}

fn majority_survival(ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
    let timing = ctx.timing();
    let Some(leader) = require_leader(ctx, tc, "No initial leader found") else {
        return Ok(Verdict::Failed);
    };
    tc.log(format!("Initial leader: {leader}"));

    if !put_or_log(ctx, tc, "survival_key", "survival_value", "Failed to put initial data") {
        return Ok(Verdict::Failed);
    }

    let victim = ctx.non_leader(&leader).ok_or_else(|| RfhError::InvalidConfig {
        details: "scenarios.stop_preference has no non-leader candidate".to_string(),
    })?;
    tc.log(format!("Stopping node: {victim}"));
    if !ctx.stop_and_confirm(tc, &victim, "node") {
        return Ok(Verdict::Failed);
    }
    ctx.settle(timing.stabilize_ms);

    let Some(new_leader) = ctx.leader_within(timing.failover_settle_ms) else {
        return fail(tc, "No leader after node failure");
    };
    tc.log(format!("New leader after failure: {new_leader}"));
    ctx.settle(timing.majority_settle_ms);

    if !put_or_log(ctx, tc, "survival_key2", "survival_value2", "Failed to put data after node failure") {
        return Ok(Verdict::Failed);
    }
    let old = ctx.api.get("survival_key");
    if !old.has_value("survival_value") {
        return fail(
            tc,
            format!(
                "Old data lost or corrupted: expected 'survival_value', got '{}'",
                old.detail()
            ),
        );
    }

    ctx.restart(tc, &victim, "node", false);
    Ok(Verdict::Passed)
}

/// Shared body of the two quorum-loss scenarios. `check_writes` adds the
/// "writes must fail" assertion.
fn quorum_loss(
    ctx: &ScenarioContext,
    tc: &mut TestCase,
    victims: &[String],
    expectation: &str,
    check_writes: bool,
) -> Result<Verdict> {
    let timing = ctx.timing();
    for id in victims {
        tc.log(format!("Stopping node: {id}"));
        if !ctx.stop_and_confirm(tc, id, "node") {
            return Ok(Verdict::Failed);
        }
    }
    ctx.settle(timing.stabilize_ms);

    if let Some(leader) = ctx.leader_within(timing.leader_check_timeout_ms) {
        return fail(
            tc,
            format!("Unexpected leader found: {leader} (expected {expectation})"),
        );
    }
    tc.log(format!("SUCCESS: No leader elected ({expectation} as expected)"));

    if check_writes {
        if ctx.api.put("no_quorum_key", "no_quorum_value").success {
            return fail(tc, "Write operation succeeded when it should have failed");
        }
        tc.log("SUCCESS: Write operations correctly failed without quorum");
    }

    for id in victims {
        ctx.restart(tc, id, "node", false);
    }
    ctx.settle(timing.recovery_settle_ms);
    if ctx.leader_within(timing.reelection_timeout_ms).is_none() {
        tc.log("WARNING: Cluster did not recover after restarting nodes");
    }
    Ok(Verdict::Passed)
}

fn leader_failure(ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
    let timing = ctx.timing();
    let Some(initial) = require_leader(ctx, tc, "No initial leader found") else {
        return Ok(Verdict::Failed);
    };
    tc.log(format!("Initial leader: {initial}"));

    if !put_or_log(ctx, tc, "leader_fail_key", "leader_fail_value", "Failed to put initial data") {
        return Ok(Verdict::Failed);
    }

    tc.log(format!("Stopping current leader: {initial}"));
    if !ctx.stop_and_confirm(tc, &initial, "leader") {
        return Ok(Verdict::Failed);
    }
    ctx.settle(timing.stabilize_ms);

    let Some(new_leader) = ctx.leader_within(timing.reelection_timeout_ms) else {
        return fail(tc, "No new leader elected after leader failure");
    };
    if new_leader == initial {
        return fail(tc, "Same leader elected after failure (should be different)");
    }
    tc.log(format!("SUCCESS: New leader elected: {new_leader}"));

    let prior = ctx.api.get("leader_fail_key");
    if !prior.has_value("leader_fail_value") {
        return fail(
            tc,
            format!(
                "Data lost during leader transition: expected 'leader_fail_value', got '{}'",
                prior.detail()
            ),
        );
    }
    if !put_or_log(ctx, tc, "leader_fail_key2", "leader_fail_value2", "Failed to put data with new leader") {
        return Ok(Verdict::Failed);
    }

    ctx.restart(tc, &initial, "old leader", false);
    Ok(Verdict::Passed)
}

fn leader_return(ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
    let timing = ctx.timing();
    let Some(current) = require_leader(ctx, tc, "No current leader found") else {
        return Ok(Verdict::Failed);
    };
    tc.log(format!("Current leader: {current}"));

    if !put_or_log(ctx, tc, "leader_return_key1", "leader_return_value1", "Failed to put initial data") {
        return Ok(Verdict::Failed);
    }

    tc.log(format!("Stopping current leader: {current}"));
    if !ctx.stop_and_confirm(tc, &current, "leader") {
        return Ok(Verdict::Failed);
    }
    ctx.settle(timing.stabilize_ms);

    let new_leader = ctx.leader_within(timing.failover_settle_ms);
    let Some(new_leader) = new_leader.filter(|id| *id != current) else {
        return fail(tc, "Invalid new leader after stopping current leader");
    };
    tc.log(format!("New leader: {new_leader}"));

    if !put_or_log(ctx, tc, "leader_return_key2", "leader_return_value2", "Failed to put data with new leader") {
        return Ok(Verdict::Failed);
    }

    if !ctx.restart(tc, &current, "old leader", true) {
        return Ok(Verdict::Failed);
    }
    ctx.settle(timing.sync_settle_ms);

    let pairs = [
        ("leader_return_key1", "leader_return_value1"),
        ("leader_return_key2", "leader_return_value2"),
    ];
    if !verify_synchronized(ctx, tc, &current, "Leader", &pairs) {
        return Ok(Verdict::Failed);
    }
    tc.log(format!(
        "SUCCESS: Leader {current} successfully synchronized with cluster state"
    ));
    Ok(Verdict::Passed)
}

fn follower_return(ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
    let timing = ctx.timing();
    let Some(leader) = require_leader(ctx, tc, "No leader found") else {
        return Ok(Verdict::Failed);
    };
    tc.log(format!("Current leader: {leader}"));

    if !put_or_log(ctx, tc, "follower_return_key1", "follower_return_value1", "Failed to put initial data") {
        return Ok(Verdict::Failed);
    }

    let follower = ctx.non_leader(&leader).ok_or_else(|| RfhError::InvalidConfig {
        details: "scenarios.stop_preference has no non-leader candidate".to_string(),
    })?;
    tc.log(format!("Stopping follower: {follower}"));
    if !ctx.stop_and_confirm(tc, &follower, "follower") {
        return Ok(Verdict::Failed);
    }
    ctx.settle(timing.follower_settle_ms);

    if !put_or_log(
        ctx,
        tc,
        "follower_return_key2",
        "follower_return_value2",
        "Failed to put data while follower is down",
    ) {
        return Ok(Verdict::Failed);
    }

    if !ctx.restart(tc, &follower, "follower", true) {
        return Ok(Verdict::Failed);
    }
    ctx.settle(timing.follower_settle_ms);

    let pairs = [
        ("follower_return_key1", "follower_return_value1"),
        ("follower_return_key2", "follower_return_value2"),
    ];
    if !verify_synchronized(ctx, tc, &follower, "Follower", &pairs) {
        return Ok(Verdict::Failed);
    }
    tc.log(format!(
        "SUCCESS: Follower {follower} successfully synchronized with cluster state"
    ));
    Ok(Verdict::Passed)
}

fn data_persistence(ctx: &ScenarioContext, tc: &mut TestCase) -> Result<Verdict> {
    let timing = ctx.timing();
    let Some(initial) = require_leader(ctx, tc, "No initial leader found") else {
        return Ok(Verdict::Failed);
    };
    tc.log(format!("Initial leader: {initial}"));

    let now = chrono::Utc::now();
    let stamp = format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros());
    let pairs: Vec<(String, String)> = (0..ctx.scenarios.persistence_pairs)
        .map(|i| {
            (
                format!("persistence_key_{i}"),
                format!("persistence_value_{i}_with_timestamp_{stamp}"),
            )
        })
        .collect();
    for (key, value) in &pairs {
        let outcome = ctx.api.put(key, value);
        if !outcome.success {
            return fail(tc, format!("Failed to put {key}: {}", outcome.message));
        }
    }
    tc.log(format!("SUCCESS: Stored {} key-value pairs", pairs.len()));

    tc.log(format!("Forcing leader change by stopping {initial}"));
    if !ctx.controller.stop_node(&initial) {
        return fail(tc, format!("Failed to stop leader {initial}"));
    }
    ctx.settle(timing.failover_settle_ms);

    let Some(new_leader) = ctx.leader_within(timing.reelection_timeout_ms) else {
        return fail(tc, "No new leader elected");
    };
    tc.log(format!("New leader: {new_leader}"));

    let mut intact = true;
    for (key, expected) in &pairs {
        let outcome = ctx.api.get(key);
        if outcome.has_value(expected) {
            tc.log(format!("SUCCESS: {key} preserved correctly"));
        } else {
            tc.log(format!(
                "ERROR: {key} corrupted or lost: expected '{expected}', got '{}'",
                outcome.detail()
            ));
            intact = false;
        }
    }
    if !put_or_log(
        ctx,
        tc,
        "persistence_key_new",
        "persistence_value_new",
        "Failed to put new data under new leader",
    ) {
        intact = false;
    }

    if !intact {
        return Ok(Verdict::Failed);
    }
    tc.log("SUCCESS: All data persisted correctly through leader change");
    Ok(Verdict::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in ScenarioKind::ALL {
            assert_eq!(kind.name().parse::<ScenarioKind>().unwrap(), kind);
        }
        assert!("split_brain".parse::<ScenarioKind>().is_err());
    }

    #[test]
    fn catalog_order_is_fixed() {
        let names: Vec<&str> = ScenarioKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.first(), Some(&"startup_and_leader_election"));
        assert_eq!(names.last(), Some(&"data_persistence"));
        let mut sorted = ScenarioKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ScenarioKind::ALL);
    }

    #[test]
    fn every_scenario_has_a_description() {
        assert!(ScenarioKind::ALL.iter().all(|k| !k.description().is_empty()));
    }
}
