//! Configuration validation for the drift detector.
//!
//! Field ranges are declared on the config types with `validator` derives.
//! This module runs them, flattens the result into field paths and adds the
//! checks that need the attribute registry.

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use tracing::{debug, warn};

use crate::compare::Attribute;
use crate::error::{ConfigError, Result};

use super::spec::DetectorConfig;

/// Rate above which EC2 request throttling becomes likely.
const HIGH_RATE_LIMIT: u32 = 100;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

/// Validator for detector configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for the first unknown attribute name, or for the
    /// first failed field check.
    pub fn validate(&self, config: &DetectorConfig) -> Result<ValidationResult> {
        Self::check_attributes(&config.detection.attributes)?;

        let mut result = ValidationResult::default();

        if let Err(errors) = config.validate() {
            flatten("", &errors, &mut result.errors);
            result.errors.sort_by(|a, b| a.field.cmp(&b.field));
        }

        Self::collect_warnings(config, &mut result);

        if let Some(first_error) = result.errors.first() {
            return Err(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }
            .into());
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }
        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Checks that every name resolves in the attribute registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAttribute`] for the first unknown name.
    pub fn check_attributes(names: &[String]) -> Result<()> {
        if let Some(unknown) = names.iter().find(|n| Attribute::from_name(n).is_none()) {
            return Err(ConfigError::UnknownAttribute {
                name: unknown.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn collect_warnings(config: &DetectorConfig, result: &mut ValidationResult) {
        if config.fetch.rate_limit_per_second > HIGH_RATE_LIMIT {
            result.warnings.push(format!(
                "fetch.rate_limit_per_second is {}, EC2 is likely to throttle above {HIGH_RATE_LIMIT}",
                config.fetch.rate_limit_per_second
            ));
        }

        if config.fetch.max_retries == 0 {
            result
                .warnings
                .push(String::from("fetch.max_retries is 0, transient failures will not be retried"));
        }
    }
}

/// Turns nested `validator` errors into dotted field paths.
fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationError>) {
    for (field, kind) in errors.errors() {
        let path = if field.to_string() == "__all__" {
            prefix.to_string()
        } else if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let message = failure.message.as_ref().map_or_else(
                        || format!("{path} failed the '{}' check", failure.code),
                        |m| format!("{path}: {m}"),
                    );
                    out.push(ValidationError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}
