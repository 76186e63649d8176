//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use super::formatter::Status;
use anyhow::Result;
use deckprep_core::RunReport;
use deckprep_core::report::Outcome;
use deckprep_core::report::OutcomeCounts;
use deckprep_core::report::UnitKind;
use deckprep_core::report::UnitRecord;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter;

#[derive(Serialize)]
struct CountsOutput {
    succeeded: usize,
    skipped: usize,
    failed: usize,
}

impl From<OutcomeCounts> for CountsOutput {
    fn from(counts: OutcomeCounts) -> Self {
        Self {
            succeeded: counts.succeeded,
            skipped: counts.skipped,
            failed: counts.failed,
        }
    }
}

#[derive(Serialize)]
struct ConflictOutput {
    path: String,
    existing: String,
    resolution: String,
}

#[derive(Serialize)]
struct UnitOutput {
    path: String,
    kind: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<String>,
    entries_written: usize,
    directories_created: usize,
    bytes_written: u64,
    conflicts: Vec<ConflictOutput>,
    warnings: Vec<String>,
}

impl UnitOutput {
    fn new(path: &Path, record: &UnitRecord) -> Self {
        let (reason, severity) = match &record.outcome {
            Outcome::Success => (None, None),
            Outcome::Skipped(reason) => (Some(reason.to_string()), None),
            Outcome::Failed(failure) => (
                Some(failure.message.clone()),
                Some(failure.severity.to_string()),
            ),
        };

        Self {
            path: path.display().to_string(),
            kind: record.kind.to_string(),
            outcome: record.outcome.label(),
            reason,
            severity,
            entries_written: record.entries_written,
            directories_created: record.directories_created,
            bytes_written: record.bytes_written,
            conflicts: record
                .conflicts
                .iter()
                .map(|conflict| ConflictOutput {
                    path: conflict.entry_path.display().to_string(),
                    existing: conflict.existing.to_string(),
                    resolution: conflict.resolution.to_string(),
                })
                .collect(),
            warnings: record.warnings.clone(),
        }
    }
}

#[derive(Serialize)]
struct RunOutput {
    root: String,
    archives: CountsOutput,
    documents: CountsOutput,
    conflicts: usize,
    passes: usize,
    cancelled: bool,
    duration_ms: u128,
    units: Vec<UnitOutput>,
}

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }

    fn run_output(root: &Path, report: &RunReport) -> JsonOutput<RunOutput> {
        let data = RunOutput {
            root: root.display().to_string(),
            archives: report.counts(UnitKind::Archive).into(),
            documents: report.counts(UnitKind::Document).into(),
            conflicts: report.conflict_count(),
            passes: report.passes,
            cancelled: report.cancelled,
            duration_ms: report.duration.as_millis(),
            units: report
                .iter()
                .map(|(path, record)| UnitOutput::new(path, record))
                .collect(),
        };

        let status = if report.has_failures() {
            Status::Partial
        } else {
            Status::Success
        };
        JsonOutput::with_status("run", status, data)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_run_result(&self, root: &Path, report: &RunReport) -> Result<()> {
        Self::output(&Self::run_output(root, report))
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error("run", format!("{error:?}"));
        let _ = Self::output(&output);
    }

    fn format_warning(&self, message: &str) {
        #[derive(Serialize)]
        struct WarningData {
            message: String,
        }

        let output = JsonOutput::success(
            "warning",
            WarningData {
                message: message.to_string(),
            },
        );
        // stdout carries only the result document
        if let Ok(json) = serde_json::to_string(&output) {
            let _ = writeln!(io::stderr(), "{json}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_structure() {
        let output = JsonFormatter::run_output(Path::new("/inbox"), &RunReport::new());
        let json: serde_json::Value = serde_json::to_value(&output).unwrap();

        assert_eq!(json["operation"], "run");
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["root"], "/inbox");
        assert_eq!(json["data"]["archives"]["failed"], 0);
        assert!(json["data"]["units"].as_array().unwrap().is_empty());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_envelope() {
        let output = JsonOutput::<()>::error("run", "boom");
        let json: serde_json::Value = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
    }
}
