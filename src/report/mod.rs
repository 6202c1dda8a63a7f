//! Report generation from the ordered list of finished test cases.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::core::config::ReportConfig;
use crate::core::errors::{Result, RfhError};
use crate::scenario::test_case::TestCase;

pub mod json;
pub mod markdown;
pub mod tally;

pub use tally::Tally;

/// Run-level facts printed in the report header.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub generated_at: DateTime<Local>,
    pub config_hash: Option<String>,
    pub simulated: bool,
}

impl ReportMeta {
    #[must_use]
    pub fn now() -> Self {
        Self {
            generated_at: Local::now(),
            config_hash: None,
            simulated: false,
        }
    }
}

/// Where the report files ended up.
#[derive(Debug, Clone, Default)]
pub struct WrittenReports {
    pub markdown: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Render and write the Markdown report and, when configured, the JSON one.
pub fn write_reports(
    cases: &[TestCase],
    meta: &ReportMeta,
    config: &ReportConfig,
) -> Result<WrittenReports> {
    let mut written = WrittenReports::default();

    write_file(&config.markdown_path, &markdown::render(cases, meta))?;
    written.markdown = Some(config.markdown_path.clone());

    if let Some(path) = &config.json_path {
        let body = serde_json::to_string_pretty(&json::build(cases, meta))?;
        write_file(path, &body)?;
        written.json = Some(path.clone());
    }
    Ok(written)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| RfhError::io(parent, source))?;
    }
    fs::write(path, contents).map_err(|source| RfhError::io(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_markdown_and_optional_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig {
            markdown_path: dir.path().join("out/report.md"),
            json_path: Some(dir.path().join("out/report.json")),
            ..ReportConfig::default()
        };
        let cases = vec![TestCase::new("startup_and_leader_election", "d")];
        let written = write_reports(&cases, &ReportMeta::now(), &config).unwrap();

        let md = fs::read_to_string(written.markdown.unwrap()).unwrap();
        assert!(md.contains("[SKIP] startup_and_leader_election"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(written.json.unwrap()).unwrap()).unwrap();
        assert_eq!(json["summary"]["total"], 1);
    }

    #[test]
    fn json_is_skipped_when_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig {
            markdown_path: dir.path().join("report.md"),
            json_path: None,
            ..ReportConfig::default()
        };
        let written = write_reports(&[], &ReportMeta::now(), &config).unwrap();
        assert!(written.json.is_none());
    }
}
