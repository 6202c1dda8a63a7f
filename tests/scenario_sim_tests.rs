//! End-to-end scenario runs against the in-memory cluster.

use std::sync::Arc;

use proptest::prelude::*;
use raft_fault_harness::core::config::TimingConfig;
use raft_fault_harness::prelude::*;
use raft_fault_harness::scenario;

fn controller(sim: &SimCluster) -> ClusterController {
    ClusterController::new(
        sim.nodes(),
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
        TimingConfig::instant(),
        EventLog::disabled(),
    )
}

fn context(sim: &SimCluster) -> ScenarioContext {
    let config = HarnessConfig::default();
    ScenarioContext::new(controller(sim), config.scenarios)
}

/// Run `kind` the way the driver would: the cluster is already up unless the
/// scenario starts it itself.
fn run_on(sim: &SimCluster, kind: ScenarioKind) -> TestCase {
    let ctx = context(sim);
    if kind != ScenarioKind::StartupAndLeaderElection {
        assert!(ctx.controller.start_cluster());
    }
    scenario::run_scenario(kind, &ctx)
}

fn assert_failed_with(case: &TestCase, error: &str) {
    assert_eq!(case.verdict(), Verdict::Failed, "{:#?}", case.logs());
    assert!(
        case.logs().iter().any(|line| line.contains(error)),
        "missing {error:?} in {:#?}",
        case.logs()
    );
}

fn driver(sim: &SimCluster, dir: &std::path::Path, shutdown: SignalHandler) -> HarnessDriver {
    let mut config = HarnessConfig::default();
    config.timing = TimingConfig::instant();
    config.report.markdown_path = dir.join("report.md");
    HarnessDriver::new(
        config,
        Arc::new(sim.clone()),
        Arc::new(sim.clone()),
        EventLog::disabled(),
        shutdown,
    )
}

#[test]
fn full_suite_passes_on_a_healthy_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let sim = SimCluster::four_nodes();
    let outcome = driver(&sim, dir.path(), SignalHandler::detached())
        .run(&RunOptions::default())
        .unwrap();

    let failing: Vec<(&str, Vec<String>)> = outcome
        .cases
        .iter()
        .filter(|c| c.verdict() != Verdict::Passed)
        .map(|c| (c.name(), c.logs().to_vec()))
        .collect();
    assert!(failing.is_empty(), "non-passing scenarios: {failing:#?}");
    assert_eq!(outcome.tally.passed, 9);
    assert!(outcome.teardown_ok);
    assert!(!sim.is_up("node1"));
    assert!(dir.path().join("report.md").exists());
}

#[test]
fn every_scenario_passes_in_isolation() {
    for kind in ScenarioKind::ALL {
        let sim = SimCluster::four_nodes();
        let ctx = context(&sim);
        if kind != ScenarioKind::StartupAndLeaderElection {
            assert!(ctx.controller.start_cluster());
        }
        let case = scenario::run_scenario(kind, &ctx);
        assert_eq!(case.verdict(), Verdict::Passed, "{kind}: {:#?}", case.logs());
        assert!(case.is_finished());
    }
}

#[test]
fn startup_fails_when_no_leader_can_form() {
    let sim = SimCluster::four_nodes();
    sim.override_quorum(5);
    let case = run_on(&sim, ScenarioKind::StartupAndLeaderElection);
    assert_failed_with(
        &case,
        "ERROR: Leader election failed - no leader elected within timeout",
    );
}

#[test]
fn replication_fails_when_a_node_cannot_serve_reads() {
    let sim = SimCluster::four_nodes();
    sim.fail_reads("node3", true);
    let case = run_on(&sim, ScenarioKind::DataReplication);
    assert_failed_with(
        &case,
        "ERROR: Node node3 has incorrect value for test_key_1: expected 'test_value_1'",
    );
}

#[test]
fn majority_survival_fails_when_one_node_down_stalls_the_cluster() {
    let sim = SimCluster::four_nodes();
    sim.override_quorum(4);
    let case = run_on(&sim, ScenarioKind::MajoritySurvival);
    assert_failed_with(&case, "ERROR: No leader after node failure");
}

#[test]
fn no_quorum_fails_when_a_minority_keeps_its_leader() {
    let sim = SimCluster::four_nodes();
    sim.override_quorum(1);
    let case = run_on(&sim, ScenarioKind::EdgeCaseNoQuorum);
    assert_failed_with(
        &case,
        "ERROR: Unexpected leader found: node1 (expected no quorum)",
    );
}

#[test]
fn insufficient_quorum_fails_when_a_lone_node_leads() {
    let sim = SimCluster::four_nodes();
    sim.override_quorum(1);
    let case = run_on(&sim, ScenarioKind::InsufficientQuorum);
    assert_failed_with(
        &case,
        "ERROR: Unexpected leader found: node1 (expected insufficient quorum)",
    );
}

#[test]
fn leader_failure_fails_when_the_same_leader_is_observed() {
    let sim = SimCluster::four_nodes();
    sim.ignore_stop("node1", true);
    let case = run_on(&sim, ScenarioKind::LeaderFailure);
    assert!(
        case.logs()
            .iter()
            .any(|line| line.contains("WARNING: Leader node1 is still responding after stop"))
    );
    assert_failed_with(
        &case,
        "ERROR: Same leader elected after failure (should be different)",
    );
}

#[test]
fn leader_failure_fails_when_a_committed_write_is_lost() {
    let sim = SimCluster::four_nodes();
    sim.drop_key_on_failover("leader_fail_key");
    let case = run_on(&sim, ScenarioKind::LeaderFailure);
    assert_failed_with(
        &case,
        "ERROR: Data lost during leader transition: expected 'leader_fail_value'",
    );
}

#[test]
fn leader_return_fails_when_old_leader_stays_stale() {
    let sim = SimCluster::four_nodes();
    sim.freeze("node1", true);
    let case = run_on(&sim, ScenarioKind::LeaderReturn);
    assert_failed_with(
        &case,
        "ERROR: Leader node1 not synchronized: leader_return_key2 expected 'leader_return_value2'",
    );
}

#[test]
fn follower_return_fails_when_follower_never_catches_up() {
    let sim = SimCluster::four_nodes();
    sim.freeze("node4", true);
    let case = run_on(&sim, ScenarioKind::FollowerReturn);
    assert_failed_with(
        &case,
        "ERROR: Follower node4 does not serve follower_return_key1 itself",
    );
}

#[test]
fn persistence_fails_when_a_pair_is_lost_in_failover() {
    let sim = SimCluster::four_nodes();
    sim.drop_key_on_failover("persistence_key_3");
    let case = run_on(&sim, ScenarioKind::DataPersistence);
    assert_failed_with(&case, "ERROR: persistence_key_3 corrupted or lost");
    assert!(
        case.logs()
            .iter()
            .any(|line| line.contains("SUCCESS: persistence_key_2 preserved correctly"))
    );
}

#[test]
fn suite_with_quorum_violation_is_not_a_pass() {
    let dir = tempfile::tempdir().unwrap();
    let sim = SimCluster::four_nodes();
    sim.override_quorum(1);
    let options = RunOptions {
        scenarios: vec![
            ScenarioKind::InsufficientQuorum,
            ScenarioKind::EdgeCaseNoQuorum,
            ScenarioKind::DataReplication,
        ],
        echo: false,
    };
    let outcome = driver(&sim, dir.path(), SignalHandler::detached())
        .run(&options)
        .unwrap();

    assert!(!outcome.passed());
    assert_eq!(outcome.tally.failed, 2);
    assert_eq!(outcome.tally.passed, 1);
    let failed: Vec<&str> = outcome
        .cases
        .iter()
        .filter(|c| c.verdict() == Verdict::Failed)
        .map(TestCase::name)
        .collect();
    assert_eq!(failed, ["edge_case_no_quorum", "insufficient_quorum"]);
    assert!(outcome.teardown_ok);
    let report = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(report.contains("### [FAIL] edge_case_no_quorum ("));
}

#[test]
fn committed_writes_survive_leader_failover() {
    let sim = SimCluster::four_nodes();
    let ctrl = controller(&sim);
    let api = ClusterApiClient::for_controller(&ctrl);
    assert!(ctrl.start_cluster());
    let old_leader = ctrl
        .wait_for_leader_election(TimingConfig::ms(50))
        .unwrap();

    assert!(api.put("k1", "v1").success);
    assert!(api.put("k2", "v2").success);
    assert!(ctrl.stop_node(&old_leader));

    let new_leader = ctrl
        .wait_for_leader_election(TimingConfig::ms(50))
        .unwrap();
    assert_ne!(new_leader, old_leader);
    assert!(api.get("k1").has_value("v1"));
    assert!(api.get("k2").has_value("v2"));
    assert!(api.put("k3", "v3").success);
}

#[test]
fn half_the_cluster_down_means_no_leader_and_no_writes() {
    let sim = SimCluster::four_nodes();
    let ctrl = controller(&sim);
    let api = ClusterApiClient::for_controller(&ctrl);
    assert!(ctrl.start_cluster());
    assert!(ctrl.stop_node("node3"));
    assert!(ctrl.stop_node("node4"));

    assert_eq!(ctrl.wait_for_leader_election(TimingConfig::ms(5)), None);
    let outcome = api.put("k", "v");
    assert!(!outcome.success);
    assert!(!outcome.message.is_empty());
}

#[test]
fn stopping_a_stopped_cluster_is_harmless() {
    let sim = SimCluster::four_nodes();
    let ctrl = controller(&sim);
    assert!(ctrl.start_cluster());
    assert!(ctrl.stop_cluster());
    assert!(ctrl.stop_cluster());
    assert_eq!(ctrl.poll_leaders(), LeaderRound::None);
}

#[test]
fn failed_startup_does_not_stop_the_suite() {
    let dir = tempfile::tempdir().unwrap();
    let sim = SimCluster::four_nodes();
    sim.reject_launches(true);
    let options = RunOptions {
        scenarios: vec![ScenarioKind::StartupAndLeaderElection, ScenarioKind::DataReplication],
        echo: false,
    };
    let outcome = driver(&sim, dir.path(), SignalHandler::detached())
        .run(&options)
        .unwrap();

    assert_eq!(outcome.cases.len(), 2);
    assert_eq!(outcome.cases[0].verdict(), Verdict::Failed);
    assert!(outcome.cases[1].is_finished());
    assert!(!outcome.passed());
    assert!(!outcome.teardown_ok);
}

#[test]
fn interrupted_suite_reports_skips() {
    let dir = tempfile::tempdir().unwrap();
    let sim = SimCluster::four_nodes();
    let shutdown = SignalHandler::detached();
    shutdown.request_shutdown();
    let outcome = driver(&sim, dir.path(), shutdown)
        .run(&RunOptions::default())
        .unwrap();

    assert!(outcome.interrupted);
    assert_eq!(outcome.tally.skipped, 9);
    assert!(outcome.passed());
    let report = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
    assert!(report.contains("[SKIP]"));
}

#[test]
fn extra_leader_fails_startup() {
    let sim = SimCluster::four_nodes();
    let ctx = context(&sim);
    assert!(ctx.controller.start_cluster());
    sim.force_extra_leader("node4");
    assert!(matches!(ctx.controller.poll_leaders(), LeaderRound::Split(_)));
    assert_eq!(ctx.controller.wait_for_leader_election(TimingConfig::ms(5)), None);
}

fn leader_ids() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(vec!["node1", "node2", "node3", "node4"], 0..=4)
        .prop_map(|ids| ids.into_iter().map(str::to_string).collect())
}

proptest! {
    #[test]
    fn leader_round_only_names_a_unique_leader(ids in leader_ids()) {
        let round = LeaderRound::from_leaders(ids.clone());
        match ids.len() {
            0 => prop_assert_eq!(round, LeaderRound::None),
            1 => prop_assert_eq!(round.leader(), Some(ids[0].as_str())),
            _ => prop_assert_eq!(round, LeaderRound::Split(ids)),
        }
    }
}
