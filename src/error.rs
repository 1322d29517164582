//! Error types for the drift detector.
//!
//! This module provides the error hierarchy for every stage of a detection
//! run: configuration, baseline loading, remote fetches, and orchestration.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the drift detector.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Baseline loading errors.
    #[error("Baseline error: {0}")]
    Baseline(#[from] BaselineError),

    /// Detection errors.
    #[error("{0}")]
    Detect(#[from] DetectError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An attribute name does not resolve in the attribute registry.
    #[error("Unknown attribute: {name}")]
    UnknownAttribute {
        /// The unrecognized attribute name.
        name: String,
    },

    /// An environment override holds an unusable value.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Baseline loading errors.
///
/// Any of these aborts the whole detection run.
#[derive(Debug, Error)]
pub enum BaselineError {
    /// The baseline path does not exist or cannot be read.
    #[error("Cannot access baseline {path}: {message}")]
    Unreadable {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO message.
        message: String,
    },

    /// The baseline document is not valid Terraform state or configuration.
    #[error("Failed to parse baseline {path}: {message}")]
    ParseError {
        /// Path of the document.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Classification tag carried by every fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// Provider throttled the request.
    Throttling,
    /// Credentials were rejected or lack permission.
    Authentication,
    /// The instance does not exist.
    NotFound,
    /// Timeouts, connection failures, and cancellation.
    Network,
    /// Anything the classifier does not recognize.
    Unknown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Throttling => "THROTTLING",
            Self::Authentication => "AUTHENTICATION",
            Self::NotFound => "NOT_FOUND",
            Self::Network => "NETWORK",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// What a fetch was aimed at.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTarget {
    /// A single instance.
    Instance(String),
    /// A multi-instance chunk.
    Batch,
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(id) => write!(f, "{id}"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// A classified failure to fetch live instance state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("EC2 error for instance {target} [{class}]: {cause}")]
pub struct FetchError {
    /// Instance id or batch marker.
    pub target: FetchTarget,
    /// Classification tag.
    pub class: ErrorClass,
    /// Whether the retry loop may try again.
    pub retryable: bool,
    /// Underlying cause as reported by the provider.
    pub cause: String,
}

/// Detection errors, per instance and aggregated.
#[derive(Debug, Clone, Error)]
pub enum DetectError {
    /// The requested instance is not declared in the baseline.
    #[error("instance {instance_id} not in baseline")]
    NotInBaseline {
        /// Instance id.
        instance_id: String,
    },

    /// The provider response did not contain the instance.
    #[error("instance {instance_id} not found in EC2 response")]
    NotFoundRemotely {
        /// Instance id.
        instance_id: String,
    },

    /// The live state fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A worker task ended without producing a result.
    #[error("detection worker failed: {message}")]
    Worker {
        /// Join failure description.
        message: String,
    },

    /// Some instances could not be checked.
    #[error("{message}")]
    Partial {
        /// Number of failed instances.
        failed: usize,
        /// Number of instances that produced a report.
        succeeded: usize,
        /// Aggregate message.
        message: String,
    },
}

/// Result type alias for drift detector operations.
pub type Result<T> = std::result::Result<T, DriftError>;

impl FetchError {
    /// Builds an error with an explicit class.
    #[must_use]
    pub fn new(
        target: FetchTarget,
        class: ErrorClass,
        retryable: bool,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            target,
            class,
            retryable,
            cause: cause.into(),
        }
    }

    /// The instance is absent from a single-instance describe response.
    #[must_use]
    pub fn not_found(instance_id: &str) -> Self {
        Self::new(
            FetchTarget::Instance(instance_id.to_string()),
            ErrorClass::NotFound,
            false,
            "instance not found in AWS",
        )
    }

    /// The caller's cancellation signal fired.
    #[must_use]
    pub fn cancelled(target: FetchTarget) -> Self {
        Self::new(target, ErrorClass::Network, false, "operation cancelled")
    }

    /// All attempts were used up; wraps the last classified cause.
    #[must_use]
    pub fn exhausted(attempts: u32, last: &Self) -> Self {
        Self::new(
            last.target.clone(),
            last.class,
            false,
            format!("max retries exceeded after {attempts} attempts: {}", last.cause),
        )
    }

    /// Returns true for authentication-class failures.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        self.class == ErrorClass::Authentication
    }
}

impl DetectError {
    /// Returns true if the underlying failure was authentication-class.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_auth_error())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::new(
            FetchTarget::Instance(String::from("i-123")),
            ErrorClass::Throttling,
            true,
            "RequestLimitExceeded: slow down",
        );
        assert_eq!(
            err.to_string(),
            "EC2 error for instance i-123 [THROTTLING]: RequestLimitExceeded: slow down"
        );
    }

    #[test]
    fn test_exhausted_keeps_class_and_stops_retrying() {
        let last = FetchError::new(FetchTarget::Batch, ErrorClass::Network, true, "timeout");
        let err = FetchError::exhausted(6, &last);
        assert_eq!(err.class, ErrorClass::Network);
        assert!(!err.retryable);
        assert!(err.cause.contains("timeout"));
        assert!(err.to_string().contains("instance batch"));
    }

    #[test]
    fn test_detect_error_auth_flag() {
        let auth = DetectError::from(FetchError::new(
            FetchTarget::Instance(String::from("i-1")),
            ErrorClass::Authentication,
            false,
            "AuthFailure",
        ));
        assert!(auth.is_auth_error());

        let missing = DetectError::NotInBaseline {
            instance_id: String::from("i-2"),
        };
        assert!(!missing.is_auth_error());
        assert_eq!(missing.to_string(), "instance i-2 not in baseline");
    }
}
