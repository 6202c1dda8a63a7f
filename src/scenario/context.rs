//! Shared handles and step helpers every scenario uses.

#![allow(missing_docs)]

use crate::cluster::api::{ClusterApiClient, KvOutcome};
use crate::cluster::controller::{ClusterController, poll_until, sleep_ms};
use crate::core::config::{ScenarioConfig, TimingConfig};
use crate::logger::EventLog;
use crate::scenario::test_case::TestCase;

/// What a scenario runs against. Built once by the driver and lent to each
/// scenario in turn.
#[derive(Clone)]
pub struct ScenarioContext {
    pub controller: ClusterController,
    pub api: ClusterApiClient,
    pub scenarios: ScenarioConfig,
    pub echo: bool,
}

impl ScenarioContext {
    #[must_use]
    pub fn new(controller: ClusterController, scenarios: ScenarioConfig) -> Self {
        let api = ClusterApiClient::for_controller(&controller);
        Self {
            controller,
            api,
            scenarios,
            echo: false,
        }
    }

    #[must_use]
    pub const fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub const fn timing(&self) -> &TimingConfig {
        self.controller.timing()
    }

    #[must_use]
    pub fn events(&self) -> EventLog {
        self.controller.events().clone()
    }

    /// Wait up to `timeout_ms` for a single leader.
    pub fn leader_within(&self, timeout_ms: u64) -> Option<String> {
        self.controller
            .wait_for_leader_election(TimingConfig::ms(timeout_ms))
    }

    pub fn settle(&self, ms: u64) {
        sleep_ms(ms);
    }

    /// First preferred victim that is not `leader`.
    pub fn non_leader(&self, leader: &str) -> Option<String> {
        self.scenarios
            .stop_preference
            .iter()
            .find(|id| id.as_str() != leader)
            .cloned()
    }

    /// Stop `id` and wait for it to go quiet. Returns false (after logging an
    /// error) only when the launcher rejects the stop.
    pub fn stop_and_confirm(&self, tc: &mut TestCase, id: &str, label: &str) -> bool {
        if !self.controller.stop_node(id) {
            tc.log(format!("ERROR: Failed to stop {label} {id}"));
            return false;
        }
        let timeout = TimingConfig::ms(self.timing().unavailable_timeout_ms);
        if !self.controller.wait_for_node_unavailable(id, timeout) {
            tc.log(format!(
                "WARNING: {} {id} is still responding after stop",
                capitalize(label)
            ));
        }
        true
    }

    /// Start `id` again. A failed restart is an error when `required`,
    /// otherwise only a warning.
    pub fn restart(&self, tc: &mut TestCase, id: &str, label: &str, required: bool) -> bool {
        tc.log(format!("Restarting {label}: {id}"));
        if self.controller.start_node(id) {
            return true;
        }
        let level = if required { "ERROR" } else { "WARNING" };
        tc.log(format!("{level}: Failed to restart {label} {id}"));
        false
    }

    /// Poll one node until it serves `expected` for `key` or the window closes.
    pub fn node_serves(&self, node: &str, key: &str, expected: &str, window_ms: u64) -> KvOutcome {
        let mut last = KvOutcome::failure("not checked");
        poll_until(
            TimingConfig::ms(window_ms),
            self.timing().poll_interval(),
            || {
                last = self.api.get_from(node, key);
                last.has_value(expected).then_some(())
            },
        );
        last
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
