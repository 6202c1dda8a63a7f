//! Machine-readable JSON report with the same content as the Markdown one.

#![allow(missing_docs)]

use serde::Serialize;

use crate::report::ReportMeta;
use crate::report::tally::Tally;
use crate::scenario::test_case::{TestCase, Verdict};

#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    pub simulated: bool,
    pub summary: Tally,
    pub scenarios: Vec<ScenarioRecord>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioRecord {
    pub name: String,
    pub description: String,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    pub logs: Vec<String>,
}

impl From<&TestCase> for ScenarioRecord {
    fn from(case: &TestCase) -> Self {
        Self {
            name: case.name().to_string(),
            description: case.description().to_string(),
            verdict: case.verdict(),
            started_at: case.started_at().map(|t| t.to_rfc3339()),
            ended_at: case.ended_at().map(|t| t.to_rfc3339()),
            duration_secs: case.duration().map(|d| d.as_secs_f64()),
            logs: case.logs().to_vec(),
        }
    }
}

#[must_use]
pub fn build(cases: &[TestCase], meta: &ReportMeta) -> JsonReport {
    JsonReport {
        generated_at: meta.generated_at.to_rfc3339(),
        config_hash: meta.config_hash.clone(),
        simulated: meta.simulated,
        summary: Tally::from_cases(cases),
        scenarios: cases.iter().map(ScenarioRecord::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_carries_summary_and_cases() {
        let mut done = TestCase::new("leader_failure", "d");
        done.start();
        done.finish(Verdict::Passed).unwrap();
        let cases = vec![done, TestCase::new("leader_return", "d")];

        let value = serde_json::to_value(build(&cases, &ReportMeta::now())).unwrap();
        assert_eq!(value["summary"]["passed"], 1);
        assert_eq!(value["summary"]["skipped"], 1);
        assert_eq!(value["scenarios"][0]["verdict"], "PASSED");
        assert!(value["scenarios"][0]["duration_secs"].is_number());
        assert!(value["scenarios"][1].get("started_at").is_none());
        assert!(value.get("config_hash").is_none());
    }
}
