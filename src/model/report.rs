//! Drift records and per-instance reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::snapshot::AttributeValue;

/// Kind of a flagged discrepancy. Exactly one applies per drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftKind {
    /// Values differ, or composites differ in both directions.
    ValueMismatch,
    /// The baseline declares values or members the live instance lacks.
    MissingInActual,
    /// The live instance has values or members the baseline lacks.
    ExtraInActual,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ValueMismatch => "VALUE_MISMATCH",
            Self::MissingInActual => "MISSING_IN_ACTUAL",
            Self::ExtraInActual => "EXTRA_IN_ACTUAL",
        };
        write!(f, "{s}")
    }
}

/// One flagged discrepancy on one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDrift {
    /// Attribute name as requested by the caller.
    pub attribute: String,
    /// Baseline value.
    pub expected: Option<AttributeValue>,
    /// Live value.
    pub actual: Option<AttributeValue>,
    /// Drift classification.
    pub kind: DriftKind,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Per-instance drift report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Instance id.
    pub instance_id: String,
    /// True iff at least one attribute drifted.
    pub has_drift: bool,
    /// Drifts in the order attributes were checked.
    pub drifts: Vec<AttributeDrift>,
    /// Every attribute that was requested, drifted or not.
    pub checked_attributes: Vec<String>,
}

impl DriftReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(instance_id: impl Into<String>, checked_attributes: Vec<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            has_drift: false,
            drifts: Vec::new(),
            checked_attributes,
        }
    }

    /// Records a drift without details.
    pub fn add_drift(
        &mut self,
        attribute: &str,
        expected: Option<AttributeValue>,
        actual: Option<AttributeValue>,
        kind: DriftKind,
    ) {
        self.push(attribute, expected, actual, kind, None);
    }

    /// Records a drift with a detail string.
    pub fn add_drift_with_details(
        &mut self,
        attribute: &str,
        expected: Option<AttributeValue>,
        actual: Option<AttributeValue>,
        kind: DriftKind,
        details: impl Into<String>,
    ) {
        self.push(attribute, expected, actual, kind, Some(details.into()));
    }

    fn push(
        &mut self,
        attribute: &str,
        expected: Option<AttributeValue>,
        actual: Option<AttributeValue>,
        kind: DriftKind,
        details: Option<String>,
    ) {
        self.drifts.push(AttributeDrift {
            attribute: attribute.to_string(),
            expected,
            actual,
            kind,
            details,
        });
        self.has_drift = true;
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.has_drift {
            format!(
                "Instance {}: Drift detected in {} attribute(s)",
                self.instance_id,
                self.drifts.len()
            )
        } else {
            format!("Instance {}: No drift detected", self.instance_id)
        }
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for drift in &self.drifts {
            write!(f, "  - {} ({})", drift.attribute, drift.kind)?;
            if let Some(details) = &drift.details {
                write!(f, ": {details}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
