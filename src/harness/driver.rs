//! Top-level run sequencing: scenarios in catalog order, teardown exactly
//! once, then the report.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Arc;

use crate::cluster::controller::ClusterController;
use crate::cluster::launcher::{ComposeLauncher, Launcher};
use crate::cluster::sim::SimCluster;
use crate::cluster::transport::{HttpTransport, ReqwestTransport};
use crate::core::config::{HarnessConfig, TimingConfig};
use crate::core::errors::Result;
use crate::harness::signals::SignalHandler;
use crate::logger::{EventLog, EventType, LogEntry, Severity};
use crate::report::{self, ReportMeta, Tally, WrittenReports};
use crate::scenario::{self, ScenarioContext, ScenarioKind, TestCase};

const INTERRUPTED: &str = "run interrupted by shutdown signal";

/// Which scenarios to run and how loudly.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Empty means the whole catalog.
    pub scenarios: Vec<ScenarioKind>,
    pub echo: bool,
}

impl RunOptions {
    /// Selected scenarios, deduplicated, in catalog order.
    #[must_use]
    pub fn selection(&self) -> Vec<ScenarioKind> {
        if self.scenarios.is_empty() {
            return ScenarioKind::ALL.to_vec();
        }
        ScenarioKind::ALL
            .into_iter()
            .filter(|kind| self.scenarios.contains(kind))
            .collect()
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub cases: Vec<TestCase>,
    pub tally: Tally,
    pub reports: WrittenReports,
    pub teardown_ok: bool,
    pub interrupted: bool,
}

impl RunOutcome {
    /// Process success: no scenario failed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        !self.tally.has_failures()
    }
}

/// Stops the cluster exactly once: explicitly via [`TeardownGuard::run`], or
/// on drop if the run loop unwinds first.
pub struct TeardownGuard<'a> {
    controller: &'a ClusterController,
    events: EventLog,
    done: bool,
}

impl<'a> TeardownGuard<'a> {
    #[must_use]
    pub const fn new(controller: &'a ClusterController, events: EventLog) -> Self {
        Self {
            controller,
            events,
            done: false,
        }
    }

    /// Stop the cluster. Later calls return `true` without acting.
    pub fn run(&mut self) -> bool {
        if self.done {
            return true;
        }
        self.done = true;
        let ok = self.controller.stop_cluster();
        let severity = if ok { Severity::Info } else { Severity::Warning };
        self.events
            .emit(&LogEntry::new(EventType::Teardown, severity).ok(ok));
        ok
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        self.run();
    }
}

pub struct HarnessDriver {
    config: HarnessConfig,
    ctx: ScenarioContext,
    events: EventLog,
    shutdown: SignalHandler,
    simulated: bool,
}

impl HarnessDriver {
    #[must_use]
    pub fn new(
        config: HarnessConfig,
        launcher: Arc<dyn Launcher>,
        transport: Arc<dyn HttpTransport>,
        events: EventLog,
        shutdown: SignalHandler,
    ) -> Self {
        let controller =
            ClusterController::from_config(&config, launcher, transport, events.clone());
        let ctx = ScenarioContext::new(controller, config.scenarios.clone());
        Self {
            config,
            ctx,
            events,
            shutdown,
            simulated: false,
        }
    }

    /// Driver over real nodes: the configured compose tool and HTTP.
    pub fn live(config: HarnessConfig, events: EventLog, shutdown: SignalHandler) -> Result<Self> {
        let launcher = ComposeLauncher::from_config(&config.cluster)?;
        let transport = ReqwestTransport::new()?;
        Ok(Self::new(
            config,
            Arc::new(launcher),
            Arc::new(transport),
            events,
            shutdown,
        ))
    }

    /// Driver over an in-memory cluster with every delay zeroed.
    #[must_use]
    pub fn simulated(mut config: HarnessConfig, events: EventLog, shutdown: SignalHandler) -> Self {
        config.timing = TimingConfig::instant();
        let sim = SimCluster::from_config(&config.cluster);
        let mut driver = Self::new(
            config,
            Arc::new(sim.clone()),
            Arc::new(sim),
            events,
            shutdown,
        );
        driver.simulated = true;
        driver
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub const fn controller(&self) -> &ClusterController {
        &self.ctx.controller
    }

    /// Run the selected scenarios, tear down, and write the report.
    ///
    /// Only report writing can fail; scenario failures are verdicts.
    pub fn run(&self, options: &RunOptions) -> Result<RunOutcome> {
        let ctx = self.ctx.clone().with_echo(options.echo);
        let selection = options.selection();
        let config_hash = self.config.stable_hash().ok();

        let mut details = format!(
            "scenarios={} simulated={}",
            selection.len(),
            self.simulated
        );
        if let Some(hash) = &config_hash {
            let _ = write!(details, " config={hash}");
        }
        self.events
            .emit(&LogEntry::new(EventType::RunStart, Severity::Info).details(details));

        let mut cases = Vec::with_capacity(selection.len());
        let mut interrupted = false;
        let teardown_ok = {
            let mut guard = TeardownGuard::new(&ctx.controller, self.events.clone());
            if !selection.contains(&ScenarioKind::StartupAndLeaderElection)
                && !ctx.controller.start_cluster()
            {
                warn("cluster start before partial run failed; scenarios will see a down cluster");
            }
            for kind in selection {
                if !interrupted && self.shutdown.should_shutdown() {
                    interrupted = true;
                    warn("shutdown requested; remaining scenarios will be skipped");
                    self.events.emit(
                        &LogEntry::new(EventType::ShutdownRequested, Severity::Warning)
                            .scenario(kind.name()),
                    );
                }
                let case = if interrupted {
                    scenario::skipped_scenario(kind, &ctx, INTERRUPTED)
                } else {
                    scenario::run_scenario(kind, &ctx)
                };
                cases.push(case);
            }
            if options.echo {
                println!(">>> Stopping cluster...");
            }
            guard.run()
        };

        let tally = Tally::from_cases(&cases);
        let meta = ReportMeta {
            config_hash,
            simulated: self.simulated,
            ..ReportMeta::now()
        };
        let reports = report::write_reports(&cases, &meta, &self.config.report);

        let mut end = LogEntry::new(EventType::RunEnd, run_severity(&tally))
            .ok(!tally.has_failures())
            .details(format!(
                "passed={} failed={} skipped={} total={}",
                tally.passed, tally.failed, tally.skipped, tally.total
            ));
        if let Err(err) = &reports {
            end = end.error(err);
        }
        self.events.emit(&end);
        self.events.flush();

        Ok(RunOutcome {
            cases,
            tally,
            reports: reports?,
            teardown_ok,
            interrupted,
        })
    }
}

const fn run_severity(tally: &Tally) -> Severity {
    if tally.has_failures() {
        Severity::Critical
    } else {
        Severity::Info
    }
}

fn warn(message: &str) {
    let _ = writeln!(io::stderr(), "[RFH-DRIVER] {message}");
}
