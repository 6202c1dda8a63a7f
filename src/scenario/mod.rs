//! Scenario runner: executes catalog entries one at a time and guarantees each
//! produces exactly one finished [`TestCase`].

#![allow(missing_docs)]

use std::any::Any;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

pub mod catalog;
pub mod context;
pub mod test_case;

pub use catalog::ScenarioKind;
pub use context::ScenarioContext;
pub use test_case::{TestCase, Verdict};

/// Run one scenario to a finished test case. Errors and panics inside the body
/// are logged and become `FAILED`; they never escape.
pub fn run_scenario(kind: ScenarioKind, ctx: &ScenarioContext) -> TestCase {
    let mut tc = TestCase::new(kind.name(), kind.description())
        .with_echo(ctx.echo)
        .with_events(ctx.events());
    tc.start();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| kind.run(ctx, &mut tc)));
    let verdict = match outcome {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(err)) => {
            tc.log(format!("ERROR: Test failed with error: {err}"));
            Verdict::Failed
        }
        Err(payload) => {
            tc.log(format!(
                "ERROR: Test failed with panic: {}",
                panic_message(payload.as_ref())
            ));
            Verdict::Failed
        }
    };
    finish_or_report(&mut tc, verdict);
    tc
}

/// A scenario that never started, recorded with a reason and left `SKIPPED`.
pub fn skipped_scenario(kind: ScenarioKind, ctx: &ScenarioContext, reason: &str) -> TestCase {
    let mut tc = TestCase::new(kind.name(), kind.description())
        .with_echo(ctx.echo)
        .with_events(ctx.events());
    tc.log(format!("WARNING: Not executed: {reason}"));
    finish_or_report(&mut tc, Verdict::Skipped);
    tc
}

fn finish_or_report(tc: &mut TestCase, verdict: Verdict) {
    if let Err(err) = tc.finish(verdict) {
        let _ = writeln!(io::stderr(), "[RFH-SCENARIO] {err}");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cluster::controller::ClusterController;
    use crate::cluster::sim::SimCluster;
    use crate::core::config::{HarnessConfig, TimingConfig};
    use crate::logger::EventLog;

    fn context(sim: &SimCluster, stop_preference: &[&str]) -> ScenarioContext {
        let mut config = HarnessConfig::default();
        config.timing = TimingConfig::instant();
        config.scenarios.stop_preference = stop_preference.iter().map(|s| (*s).to_string()).collect();
        let controller = ClusterController::from_config(
            &config,
            Arc::new(sim.clone()),
            Arc::new(sim.clone()),
            EventLog::disabled(),
        );
        ScenarioContext::new(controller, config.scenarios)
    }

    #[test]
    fn scenario_error_becomes_failed_verdict() {
        let sim = SimCluster::four_nodes();
        let ctx = context(&sim, &["node1"]);
        assert!(ctx.controller.start_cluster());
        assert_eq!(sim.leader().as_deref(), Some("node1"));

        let tc = run_scenario(ScenarioKind::MajoritySurvival, &ctx);
        assert_eq!(tc.verdict(), Verdict::Failed);
        assert!(tc.is_finished());
        assert!(
            tc.logs()
                .iter()
                .any(|line| line.contains("ERROR: Test failed with error:"))
        );
    }

    #[test]
    fn skipped_scenario_records_reason() {
        let sim = SimCluster::four_nodes();
        let ctx = context(&sim, &["node4", "node3"]);
        let tc = skipped_scenario(ScenarioKind::LeaderReturn, &ctx, "interrupted");
        assert_eq!(tc.verdict(), Verdict::Skipped);
        assert!(tc.is_finished());
        assert!(tc.logs()[0].ends_with("WARNING: Not executed: interrupted"));
        assert!(sim.launch_history().is_empty());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
