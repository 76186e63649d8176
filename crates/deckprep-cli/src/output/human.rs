//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use crate::error::MANUAL_RECOVERY_HINT;
use anyhow::Result;
use console::Term;
use console::style;
use deckprep_core::RunReport;
use deckprep_core::error::Severity;
use deckprep_core::report::OutcomeCounts;
use deckprep_core::report::UnitKind;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
    err_term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
            err_term: Term::stderr(),
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let s = n.to_string();
        let mut result = String::new();
        let mut count = 0;

        for c in s.chars().rev() {
            if count == 3 {
                result.push(',');
                count = 0;
            }
            result.push(c);
            count += 1;
        }

        result.chars().rev().collect()
    }

    fn format_counts(label: &str, counts: OutcomeCounts) -> String {
        format!(
            "  {label:<11} {} succeeded, {} skipped, {} failed",
            Self::format_number(counts.succeeded),
            Self::format_number(counts.skipped),
            Self::format_number(counts.failed)
        )
    }

    fn header(&self, report: &RunReport, root: &Path) -> String {
        let (mark, text) = if report.cancelled {
            ("⚠", "Run cancelled")
        } else if report.has_failures() {
            ("✗", "Run finished with failures")
        } else {
            ("✓", "Run complete")
        };

        if !self.use_colors {
            return format!("{text}: {}", root.display());
        }
        let mark = if report.cancelled {
            style(mark).yellow().bold()
        } else if report.has_failures() {
            style(mark).red().bold()
        } else {
            style(mark).green().bold()
        };
        format!("{mark} {text}: {}", root.display())
    }

    fn warning_summary(report: &RunReport) -> Option<String> {
        let warned = report
            .iter()
            .filter(|(_, record)| record.has_warnings())
            .count();
        (warned > 0).then(|| {
            format!(
                "  Warnings:   {} unit(s), rerun with --verbose for details",
                Self::format_number(warned)
            )
        })
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_run_result(&self, root: &Path, report: &RunReport) -> Result<()> {
        // failures are shown even in quiet mode
        if !self.quiet || report.has_failures() {
            let _ = self.term.write_line(&self.header(report, root));
        }

        if !self.quiet {
            let _ = self.term.write_line(&Self::format_counts(
                "Archives:",
                report.counts(UnitKind::Archive),
            ));
            let _ = self.term.write_line(&Self::format_counts(
                "Documents:",
                report.counts(UnitKind::Document),
            ));

            let bytes: u64 = report.iter().map(|(_, record)| record.bytes_written).sum();
            let entries: usize = report.iter().map(|(_, record)| record.entries_written).sum();
            let _ = self.term.write_line(&format!(
                "  Extracted:  {} files, {}",
                Self::format_number(entries),
                Self::format_size(bytes)
            ));
            if report.conflict_count() > 0 {
                let _ = self.term.write_line(&format!(
                    "  Conflicts:  {}",
                    Self::format_number(report.conflict_count())
                ));
            }
            if !self.verbose
                && let Some(summary) = Self::warning_summary(report)
            {
                let _ = self.term.write_line(&summary);
            }
        }

        if self.verbose {
            let _ = self
                .term
                .write_line(&format!("  Passes:     {}", report.passes));
            let _ = self
                .term
                .write_line(&format!("  Duration:   {:?}", report.duration));

            for (path, record) in report.iter() {
                for conflict in &record.conflicts {
                    let _ = self
                        .term
                        .write_line(&format!("  conflict in {}: {conflict}", path.display()));
                }
                for warning in &record.warnings {
                    let _ = self
                        .term
                        .write_line(&format!("  warning for {}: {warning}", path.display()));
                }
            }
        }

        if report.has_failures() {
            let _ = self.term.write_line("");
            if self.use_colors {
                let _ = self
                    .term
                    .write_line(&format!("{}", style("Failures:").red().bold()));
            } else {
                let _ = self.term.write_line("Failures:");
            }
            for (path, record, failure) in report.failures() {
                let severity = match failure.severity {
                    Severity::Critical if self.use_colors => {
                        style("CRITICAL").red().bold().to_string()
                    }
                    Severity::Critical => "[critical]".to_string(),
                    Severity::Error => format!("[{}]", record.kind),
                };
                let _ = self.term.write_line(&format!(
                    "  {severity} {}: {}",
                    path.display(),
                    failure.message
                ));
            }
            if report.has_critical_failures() {
                let _ = self.term.write_line(MANUAL_RECOVERY_HINT);
            }
        }

        Ok(())
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Always show errors, even in quiet mode
        if self.use_colors {
            let _ = self
                .err_term
                .write_line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            let _ = self.err_term.write_line(&format!("ERROR: {error:?}"));
        }
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            let _ = self
                .err_term
                .write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = self.err_term.write_line(&format!("WARNING: {message}"));
        }
    }
}
