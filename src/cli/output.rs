//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! detection results to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::compare::Attribute;
use crate::config::DetectorConfig;
use crate::detector::DetectionOutcome;
use crate::model::{AttributeValue, DriftReport};

use super::commands::OutputFormat;

/// Widest cell rendered in text tables.
const MAX_CELL_WIDTH: usize = 48;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Drift row for table display.
#[derive(Tabled)]
struct DriftRow {
    #[tabled(rename = "Attribute")]
    attribute: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// Attribute row for table display.
#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    name: String,
    #[tabled(rename = "Aliases")]
    aliases: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a detection outcome for display.
    #[must_use]
    pub fn format_outcome(&self, outcome: &DetectionOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => Self::format_outcome_text(outcome),
        }
    }

    /// Formats an outcome as text.
    fn format_outcome_text(outcome: &DetectionOutcome) -> String {
        let mut output = String::new();

        for report in &outcome.reports {
            output.push_str(&Self::format_report_text(report));
            output.push('\n');
        }

        if !outcome.failures.is_empty() || !outcome.batch_errors.is_empty() {
            let _ = writeln!(output, "{} Not checked:", "✗".red());
            for failure in &outcome.failures {
                let _ = writeln!(output, "   - {}: {}", failure.instance_id, failure.message);
            }
            if !outcome.batch_errors.is_empty() {
                let _ = writeln!(output, "   Batch errors:");
                for err in &outcome.batch_errors {
                    let _ = writeln!(output, "   - {err}");
                }
            }
            output.push('\n');
        }

        let drifted = outcome.drifted_count();
        let drifted_text = if drifted == 0 {
            drifted.to_string().green()
        } else {
            drifted.to_string().yellow()
        };

        let _ = writeln!(
            output,
            "Summary: {} checked, {} with drift, {} failed ({} mode, {}ms)",
            outcome.reports.len(),
            drifted_text,
            outcome.failures.len().to_string().red(),
            outcome.mode,
            outcome.duration.as_millis()
        );

        if !outcome.baseline_digest.is_empty() {
            let digest = outcome.baseline_digest.get(..12).unwrap_or(&outcome.baseline_digest);
            let _ = writeln!(output, "Baseline: {digest}  Run: {}", outcome.run_id);
        }

        output
    }

    /// Formats one report as text.
    #[must_use]
    pub fn format_report_text(report: &DriftReport) -> String {
        if !report.has_drift {
            return format!("{} {}\n", "✓".green(), report.summary());
        }

        let mut output = format!("{} {}\n", "⚠".yellow(), report.summary());

        let rows: Vec<DriftRow> = report
            .drifts
            .iter()
            .map(|d| DriftRow {
                attribute: d.attribute.clone(),
                expected: Self::format_value(d.expected.as_ref()),
                actual: Self::format_value(d.actual.as_ref()),
                kind: d.kind.to_string(),
                details: Self::truncate(d.details.as_deref().unwrap_or(""), MAX_CELL_WIDTH),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');
        output
    }

    /// Formats the attribute registry.
    #[must_use]
    pub fn format_attributes(&self) -> String {
        match self.format {
            OutputFormat::Json => {
                let attributes: Vec<_> = Attribute::all()
                    .iter()
                    .map(|a| serde_json::json!({ "name": a.name(), "aliases": a.aliases() }))
                    .collect();
                serde_json::to_string_pretty(&attributes).unwrap_or_default()
            }
            OutputFormat::Text => {
                let rows: Vec<AttributeRow> = Attribute::all()
                    .iter()
                    .map(|a| AttributeRow {
                        name: a.name().to_string(),
                        aliases: a.aliases().join(", "),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats the effective configuration.
    #[must_use]
    pub fn format_config(&self, config: &DetectorConfig) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(config).unwrap_or_default(),
            OutputFormat::Text => serde_yaml::to_string(config).unwrap_or_default(),
        }
    }

    fn format_value(value: Option<&AttributeValue>) -> String {
        value.map_or_else(
            || "-".dimmed().to_string(),
            |v| Self::truncate(&v.to_string(), MAX_CELL_WIDTH),
        )
    }

    /// Truncates a string to a maximum length, on a character boundary.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
