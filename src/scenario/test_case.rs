//! One scenario execution: its log transcript, timing and verdict.

#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RfhError};
use crate::logger::{EventLog, EventType, LogEntry, Severity};

/// Final outcome of a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Passed,
    Failed,
    Skipped,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Short marker used in report headings.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Passed => "[PASS]",
            Self::Failed => "[FAIL]",
            Self::Skipped => "[SKIP]",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scenario's record. The verdict stays `Skipped` until [`TestCase::finish`]
/// is called, and `finish` succeeds only once.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    description: String,
    logs: Vec<String>,
    verdict: Verdict,
    started_at: Option<DateTime<Local>>,
    ended_at: Option<DateTime<Local>>,
    finished: bool,
    echo: bool,
    events: EventLog,
}

impl TestCase {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            logs: Vec::new(),
            verdict: Verdict::Skipped,
            started_at: None,
            ended_at: None,
            finished: false,
            echo: false,
            events: EventLog::disabled(),
        }
    }

    /// Mirror every log line to stdout as `[name] message`.
    #[must_use]
    pub const fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub const fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub const fn ended_at(&self) -> Option<DateTime<Local>> {
        self.ended_at
    }

    /// Wall time between `start` and `finish`; `None` unless both happened.
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.ended_at?);
        (end - start).to_std().ok()
    }

    /// Stamp the start time. Ignored once the case is finished.
    pub fn start(&mut self) {
        if self.finished {
            return;
        }
        self.started_at = Some(Local::now());
        self.events.emit(
            &LogEntry::new(EventType::ScenarioStart, Severity::Info).scenario(&self.name),
        );
        self.log("Starting test execution");
    }

    /// Append a `[HH:MM:SS] message` line. Ignored once the case is finished.
    pub fn log(&mut self, message: impl Into<String>) {
        if self.finished {
            return;
        }
        self.push_line(message.into());
    }

    fn push_line(&mut self, message: String) {
        let stamp = Local::now().format("%H:%M:%S");
        self.logs.push(format!("[{stamp}] {message}"));
        if self.echo {
            println!("[{}] {message}", self.name);
        }
        self.events.emit(
            &LogEntry::new(EventType::ScenarioLine, line_severity(&message))
                .scenario(&self.name)
                .details(message),
        );
    }

    /// Record the terminal verdict.
    pub fn finish(&mut self, verdict: Verdict) -> Result<()> {
        if self.finished {
            return Err(RfhError::AlreadyFinished {
                name: self.name.clone(),
            });
        }
        let now = Local::now();
        self.ended_at = Some(now);
        self.verdict = verdict;
        self.finished = true;

        let duration = self.duration().unwrap_or_default();
        self.push_line(format!(
            "Test finished with result: {verdict} (duration: {:.2}s)",
            duration.as_secs_f64()
        ));
        let mut entry = LogEntry::new(EventType::ScenarioFinish, verdict_severity(verdict))
            .scenario(&self.name);
        entry.verdict = Some(verdict.to_string());
        entry.duration_ms = Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        self.events.emit(&entry);
        Ok(())
    }
}

fn line_severity(message: &str) -> Severity {
    if message.starts_with("ERROR:") {
        Severity::Critical
    } else if message.starts_with("WARNING:") {
        Severity::Warning
    } else {
        Severity::Info
    }
}

const fn verdict_severity(verdict: Verdict) -> Severity {
    match verdict {
        Verdict::Passed => Severity::Info,
        Verdict::Skipped => Severity::Warning,
        Verdict::Failed => Severity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_defaults_to_skipped() {
        let tc = TestCase::new("t", "d");
        assert_eq!(tc.verdict(), Verdict::Skipped);
        assert!(tc.duration().is_none());
        assert!(!tc.is_finished());
    }

    #[test]
    fn finish_is_terminal() {
        let mut tc = TestCase::new("leader_failure", "d");
        tc.start();
        tc.finish(Verdict::Passed).unwrap();
        let err = tc.finish(Verdict::Failed).expect_err("second finish");
        assert_eq!(err.code(), "RFH-2201");
        assert_eq!(tc.verdict(), Verdict::Passed);
    }

    #[test]
    fn log_lines_are_timestamped_and_ordered() {
        let mut tc = TestCase::new("t", "d");
        tc.start();
        tc.log("SUCCESS: Leader elected - node1");
        tc.finish(Verdict::Passed).unwrap();
        let logs = tc.logs();
        assert_eq!(logs.len(), 3);
        assert!(logs[0].ends_with("] Starting test execution"));
        assert!(logs[1].ends_with("SUCCESS: Leader elected - node1"));
        assert!(logs[2].contains("Test finished with result: PASSED (duration: "));
        // "[HH:MM:SS] " prefix
        assert_eq!(&logs[0][0..1], "[");
        assert_eq!(&logs[0][9..11], "] ");
    }

    #[test]
    fn finished_case_ignores_start_and_log() {
        let mut tc = TestCase::new("t", "d");
        tc.start();
        tc.finish(Verdict::Passed).unwrap();
        let started = tc.started_at();
        let duration = tc.duration();
        assert!(duration.is_some());

        tc.start();
        tc.log("late line");
        assert_eq!(tc.logs().len(), 2);
        assert!(tc.logs()[1].contains("Test finished with result: PASSED"));
        assert_eq!(tc.started_at(), started);
        assert_eq!(tc.duration(), duration);
    }

    #[test]
    fn finish_without_start_still_records_verdict() {
        let mut tc = TestCase::new("t", "d");
        tc.finish(Verdict::Skipped).unwrap();
        assert!(tc.is_finished());
        assert!(tc.duration().is_none());
        assert!(tc.logs()[0].contains("duration: 0.00s"));
    }

    #[test]
    fn verdict_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Verdict::Failed).unwrap(), "\"FAILED\"");
        assert_eq!(Verdict::Skipped.marker(), "[SKIP]");
    }

    #[test]
    fn scenario_events_are_emitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let events = EventLog::open(&path);
        let mut tc = TestCase::new("t", "d").with_events(events.clone());
        tc.start();
        tc.log("ERROR: boom");
        tc.finish(Verdict::Failed).unwrap();
        events.flush();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"event\":\"scenario_start\""));
        assert!(text.contains("\"severity\":\"critical\""));
        assert!(text.contains("\"verdict\":\"FAILED\""));
    }
}
