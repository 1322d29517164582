//! Drift orchestration.
//!
//! [`DriftDetector`] resolves the instance ids to check, fetches live state
//! either per instance (concurrent mode) or in chunks (batch mode), compares
//! each live snapshot with its baseline entry and collects reports together
//! with per-instance failures. A failure for one instance never drops the
//! reports produced for others.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::aws::StateProvider;
use crate::baseline::{Baseline, BaselineParser, TerraformStateParser};
use crate::cancel::CancellationToken;
use crate::compare::{AttributeComparator, Compare};
use crate::error::{DetectError, Result};
use crate::model::{DriftReport, InstanceSnapshot};

/// Id count above which batch mode is used.
pub const DEFAULT_BATCH_THRESHOLD: usize = 10;

/// How live state is fetched for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// One independent fetch per instance.
    Concurrent,
    /// Chunked multi-instance fetches.
    Batch,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => write!(f, "concurrent"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

/// An instance that could not be checked.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceFailure {
    /// Instance id.
    pub instance_id: String,
    /// Failure message.
    pub message: String,
    /// True for authentication-class fetch failures.
    pub auth_failure: bool,
    /// The underlying error.
    #[serde(skip)]
    pub error: DetectError,
}

impl InstanceFailure {
    /// Records a failure for `instance_id`.
    #[must_use]
    pub fn new(instance_id: impl Into<String>, error: DetectError) -> Self {
        Self {
            instance_id: instance_id.into(),
            message: error.to_string(),
            auth_failure: error.is_auth_error(),
            error,
        }
    }
}

/// Everything one detection run produced.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionOutcome {
    /// Run identifier, also attached to the run's log span.
    pub run_id: Uuid,
    /// Fetch strategy used.
    pub mode: FetchMode,
    /// Reports for every instance that was checked.
    pub reports: Vec<DriftReport>,
    /// Instances that could not be checked.
    pub failures: Vec<InstanceFailure>,
    /// Chunk-level fetch failures in batch mode.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub batch_errors: Vec<String>,
    /// Digest of the baseline source.
    pub baseline_digest: String,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Run duration.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl DetectionOutcome {
    /// Aggregate error for the run, if any instance failed.
    ///
    /// A single failure is reported verbatim. Several failures are reported
    /// as a count; in concurrent mode authentication failures are counted
    /// separately.
    #[must_use]
    pub fn error(&self) -> Option<DetectError> {
        let message = match self.failures.as_slice() {
            [] => return None,
            [only] => only.message.clone(),
            many => {
                let summary = format!("{} instance(s) failed", many.len());
                let auth = many.iter().filter(|f| f.auth_failure).count();
                if self.mode == FetchMode::Concurrent && auth > 0 {
                    format!("{summary} ({auth} authentication failure(s))")
                } else {
                    summary
                }
            }
        };

        Some(DetectError::Partial {
            failed: self.failures.len(),
            succeeded: self.reports.len(),
            message,
        })
    }

    /// Number of reports with drift.
    #[must_use]
    pub fn drifted_count(&self) -> usize {
        self.reports.iter().filter(|r| r.has_drift).count()
    }

    /// Returns true if every requested instance produced a report.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Drift orchestrator.
pub struct DriftDetector {
    /// Live state source.
    provider: Arc<dyn StateProvider>,
    /// Snapshot comparator.
    comparator: Arc<dyn Compare>,
    /// Baseline loader.
    parser: Arc<dyn BaselineParser>,
    /// Id count above which batch mode is used.
    batch_threshold: usize,
    /// Optional cap on in-flight fetches in concurrent mode.
    max_concurrency: Option<usize>,
}

impl DriftDetector {
    /// Creates a detector with the default comparator, parser and threshold.
    #[must_use]
    pub fn new(provider: Arc<dyn StateProvider>) -> Self {
        Self {
            provider,
            comparator: Arc::new(AttributeComparator::new()),
            parser: Arc::new(TerraformStateParser::new()),
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            max_concurrency: None,
        }
    }

    /// Replaces the comparator.
    #[must_use]
    pub fn with_comparator(mut self, comparator: Arc<dyn Compare>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Replaces the baseline parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn BaselineParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Sets the batch threshold.
    #[must_use]
    pub const fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold;
        self
    }

    /// Caps concurrent fetches. `None` or zero means unbounded.
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.filter(|n| *n > 0);
        self
    }

    /// Fetch mode used for `count` instances.
    #[must_use]
    pub const fn mode_for(&self, count: usize) -> FetchMode {
        if count > self.batch_threshold {
            FetchMode::Batch
        } else {
            FetchMode::Concurrent
        }
    }

    /// Loads the baseline at `path` and runs detection against it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the baseline cannot be loaded. Per-instance
    /// failures are reported through [`DetectionOutcome::error`].
    pub async fn detect_from_path(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        instance_ids: &[String],
        attributes: &[String],
    ) -> Result<DetectionOutcome> {
        info!("Loading baseline from {}", path.display());
        let baseline = self.parser.parse(path)?;
        Ok(self
            .detect_drift(cancel, &baseline, instance_ids, attributes)
            .await)
    }

    /// Checks `instance_ids` (or every baseline instance when empty).
    pub async fn detect_drift(
        &self,
        cancel: &CancellationToken,
        baseline: &Baseline,
        instance_ids: &[String],
        attributes: &[String],
    ) -> DetectionOutcome {
        let run_id = Uuid::new_v4();
        let ids = resolve_ids(baseline, instance_ids);
        let mode = self.mode_for(ids.len());
        let span = info_span!("detect", %run_id, %mode);

        async move {
            let started_at = Utc::now();
            let start = Instant::now();

            info!(
                "Starting drift detection for {} instance(s), attributes: {}",
                ids.len(),
                attributes.join(", ")
            );

            let (reports, failures, batch_errors) = match mode {
                FetchMode::Concurrent => {
                    let (reports, failures) = self
                        .run_concurrent(cancel, baseline, &ids, attributes)
                        .await;
                    (reports, failures, Vec::new())
                }
                FetchMode::Batch => self.run_batch(cancel, baseline, &ids, attributes).await,
            };

            let outcome = DetectionOutcome {
                run_id,
                mode,
                reports,
                failures,
                batch_errors,
                baseline_digest: baseline.digest.clone(),
                started_at,
                duration: start.elapsed(),
            };

            if !outcome.is_complete() {
                warn!(
                    "Some instances could not be checked: {} failed, {} succeeded",
                    outcome.failures.len(),
                    outcome.reports.len()
                );
            }

            info!(
                "Drift detection completed in {}ms: {} checked, {} with drift",
                outcome.duration.as_millis(),
                outcome.reports.len(),
                outcome.drifted_count()
            );

            outcome
        }
        .instrument(span)
        .await
    }

    /// Checks one instance without fan-out.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance is not in the baseline or its live
    /// state cannot be fetched.
    pub async fn detect_single(
        &self,
        cancel: &CancellationToken,
        baseline: &Baseline,
        instance_id: &str,
        attributes: &[String],
    ) -> std::result::Result<DriftReport, DetectError> {
        info!("Detecting drift for single instance {instance_id}");

        let expected = baseline
            .get(instance_id)
            .ok_or_else(|| DetectError::NotInBaseline {
                instance_id: instance_id.to_string(),
            })?;

        let actual = self.provider.fetch_one(instance_id, cancel).await?;
        Ok(self.comparator.compare(expected, &actual, attributes))
    }

    async fn run_concurrent(
        &self,
        cancel: &CancellationToken,
        baseline: &Baseline,
        ids: &[String],
        attributes: &[String],
    ) -> (Vec<DriftReport>, Vec<InstanceFailure>) {
        debug!("Spawning {} instance check(s)", ids.len());

        let attributes: Arc<[String]> = attributes.into();
        let semaphore = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));

        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let check = check_instance(
                    Arc::clone(&self.provider),
                    Arc::clone(&self.comparator),
                    baseline.get(id).cloned(),
                    id.clone(),
                    Arc::clone(&attributes),
                    cancel.clone(),
                    semaphore.clone(),
                );
                (id, tokio::spawn(check.in_current_span()))
            })
            .collect();

        let mut reports = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();

        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => failures.push(InstanceFailure::new(id.as_str(), e)),
                Err(e) => failures.push(InstanceFailure::new(
                    id.as_str(),
                    DetectError::Worker {
                        message: e.to_string(),
                    },
                )),
            }
        }

        (reports, failures)
    }

    async fn run_batch(
        &self,
        cancel: &CancellationToken,
        baseline: &Baseline,
        ids: &[String],
        attributes: &[String],
    ) -> (Vec<DriftReport>, Vec<InstanceFailure>, Vec<String>) {
        let fetched = self.provider.fetch_many(ids, cancel).await;

        let batch_errors: Vec<String> = fetched
            .chunk_errors
            .iter()
            .map(ToString::to_string)
            .collect();
        if let Some(err) = fetched.error() {
            warn!("{err}");
        }

        let mut reports = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();

        for id in ids {
            let Some(expected) = baseline.get(id) else {
                warn!(instance_id = %id, "Instance not in baseline");
                failures.push(InstanceFailure::new(
                    id.as_str(),
                    DetectError::NotInBaseline {
                        instance_id: id.clone(),
                    },
                ));
                continue;
            };

            let Some(actual) = fetched.snapshots.get(id) else {
                warn!(instance_id = %id, "Instance missing from EC2 response");
                failures.push(InstanceFailure::new(
                    id.as_str(),
                    DetectError::NotFoundRemotely {
                        instance_id: id.clone(),
                    },
                ));
                continue;
            };

            reports.push(self.comparator.compare(expected, actual, attributes));
        }

        (reports, failures, batch_errors)
    }
}

/// One concurrent-mode unit of work.
async fn check_instance(
    provider: Arc<dyn StateProvider>,
    comparator: Arc<dyn Compare>,
    expected: Option<InstanceSnapshot>,
    instance_id: String,
    attributes: Arc<[String]>,
    cancel: CancellationToken,
    semaphore: Option<Arc<Semaphore>>,
) -> std::result::Result<DriftReport, DetectError> {
    let Some(expected) = expected else {
        warn!(%instance_id, "Instance not in baseline");
        return Err(DetectError::NotInBaseline { instance_id });
    };

    let _permit = match semaphore {
        Some(semaphore) => Some(semaphore.acquire_owned().await.map_err(|e| {
            DetectError::Worker {
                message: e.to_string(),
            }
        })?),
        None => None,
    };

    let actual = provider.fetch_one(&instance_id, &cancel).await?;
    Ok(comparator.compare(&expected, &actual, &attributes))
}

/// Requested ids, or every baseline id when none were requested.
/// Duplicates are dropped, first occurrence wins.
fn resolve_ids(baseline: &Baseline, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        info!(
            "No instance ids given, checking all {} baseline instance(s)",
            baseline.len()
        );
        return baseline.instance_ids();
    }

    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
