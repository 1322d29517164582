//! Configuration specification types for the drift detector.
//!
//! This module defines the structs that map to the `ec2drift.yaml` file.
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use ::validator::{Validate, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::aws::{
    DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES, DEFAULT_RATE_PER_SECOND,
    MAX_BATCH_SIZE, RetryPolicy,
};
use crate::detector::DEFAULT_BATCH_THRESHOLD;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Attribute checked when none is configured.
pub const DEFAULT_ATTRIBUTE: &str = "InstanceType";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct DetectorConfig {
    /// AWS connection settings.
    #[validate(nested)]
    pub aws: AwsConfig,
    /// Live state fetch settings.
    #[validate(nested)]
    pub fetch: FetchConfig,
    /// Detection run settings.
    #[validate(nested)]
    pub detection: DetectionConfig,
}

/// AWS connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct AwsConfig {
    /// Region to query.
    #[validate(length(min = 1, message = "region cannot be empty"))]
    pub region: String,
    /// Named profile from the shared AWS config files.
    pub profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: String::from(DEFAULT_REGION),
            profile: None,
        }
    }
}

/// Live state fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_backoff_bounds"))]
pub struct FetchConfig {
    /// Retries after the first attempt.
    #[validate(range(max = 20))]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[validate(range(min = 1))]
    pub initial_backoff_ms: u64,
    /// Cap on any single retry delay, in milliseconds.
    #[validate(range(min = 1, max = 600_000))]
    pub max_backoff_ms: u64,
    /// Provider calls allowed per second.
    #[validate(range(min = 1, max = 1000))]
    pub rate_limit_per_second: u32,
    /// Ids per describe call in batch mode.
    #[validate(range(min = 1, max = 1000))]
    pub batch_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: millis(DEFAULT_INITIAL_BACKOFF),
            max_backoff_ms: millis(DEFAULT_MAX_BACKOFF),
            rate_limit_per_second: DEFAULT_RATE_PER_SECOND,
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl FetchConfig {
    /// Retry policy described by this section.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

/// Detection run settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct DetectionConfig {
    /// Id count above which batch mode is used.
    #[validate(range(min = 1))]
    pub batch_threshold: usize,
    /// Cap on in-flight fetches in concurrent mode. Unset means unbounded.
    #[validate(range(min = 1))]
    pub max_concurrency: Option<usize>,
    /// Attributes to check when none are given on the command line.
    #[validate(length(min = 1, message = "at least one attribute must be configured"))]
    pub attributes: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            max_concurrency: None,
            attributes: vec![String::from(DEFAULT_ATTRIBUTE)],
        }
    }
}

fn validate_backoff_bounds(fetch: &FetchConfig) -> Result<(), ValidationError> {
    if fetch.initial_backoff_ms > fetch.max_backoff_ms {
        let mut err = ValidationError::new("backoff_bounds");
        err.message = Some("initial_backoff_ms cannot exceed max_backoff_ms".into());
        return Err(err);
    }
    Ok(())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.initial_backoff_ms, 1000);
        assert_eq!(config.fetch.max_backoff_ms, 32_000);
        assert_eq!(config.fetch.rate_limit_per_second, 10);
        assert_eq!(config.fetch.batch_size, 1000);
        assert_eq!(config.detection.batch_threshold, 10);
        assert_eq!(config.detection.max_concurrency, None);
        assert_eq!(config.detection.attributes, vec!["InstanceType"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = FetchConfig::default().retry_policy();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_range_violations() {
        let mut config = DetectorConfig::default();
        config.fetch.batch_size = 5000;
        config.detection.max_concurrency = Some(0);

        let errors = config.validate().unwrap_err();
        assert!(errors.errors().contains_key("fetch"));
        assert!(errors.errors().contains_key("detection"));
        assert!(!errors.errors().contains_key("aws"));
    }

    #[test]
    fn test_backoff_bounds() {
        let mut fetch = FetchConfig::default();
        fetch.initial_backoff_ms = 60_000;
        assert!(fetch.validate().is_err());
    }
}
