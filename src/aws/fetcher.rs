//! Live state fetching with retry, rate limiting and batching.
//!
//! [`StateFetcher`] wraps a [`DescribeInstances`] capability:
//!
//! - `fetch_one` retries retryable failures with capped exponential backoff
//!   and takes a rate-limit permit before every attempt
//! - `fetch_many` splits ids into chunks, takes one permit per chunk and
//!   keeps going when a chunk fails
//!
//! Backoff and permit waits race against the caller's [`CancellationToken`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{ErrorClass, FetchError, FetchTarget};
use crate::model::InstanceSnapshot;

use super::client::DescribeInstances;
use super::rate_limit::{RateLimiter, TokenBucket};
use super::retry::RetryPolicy;
use super::types::Ec2Instance;

/// Largest id count a single describe call accepts.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Result of a multi-chunk fetch.
#[derive(Debug, Default)]
pub struct BatchFetch {
    /// Snapshots keyed by the instance id reported by the provider.
    pub snapshots: HashMap<String, InstanceSnapshot>,
    /// One entry per failed chunk.
    pub chunk_errors: Vec<FetchError>,
}

impl BatchFetch {
    /// Aggregate error counting failed chunks, if any chunk failed.
    ///
    /// The class is kept when every chunk failed the same way.
    #[must_use]
    pub fn error(&self) -> Option<FetchError> {
        let first = self.chunk_errors.first()?;
        let class = if self.chunk_errors.iter().all(|e| e.class == first.class) {
            first.class
        } else {
            ErrorClass::Unknown
        };

        Some(FetchError::new(
            FetchTarget::Batch,
            class,
            false,
            format!(
                "batch fetch encountered {} error(s)",
                self.chunk_errors.len()
            ),
        ))
    }
}

/// Source of live instance snapshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Fetches one instance, retrying transient failures.
    async fn fetch_one(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<InstanceSnapshot, FetchError>;

    /// Fetches many instances in chunks without per-chunk retries.
    ///
    /// Ids missing from a successful chunk are simply absent from the result.
    async fn fetch_many(&self, instance_ids: &[String], cancel: &CancellationToken) -> BatchFetch;
}

/// [`StateProvider`] over a [`DescribeInstances`] client.
pub struct StateFetcher {
    client: Arc<dyn DescribeInstances>,
    limiter: Arc<dyn RateLimiter>,
    policy: RetryPolicy,
    batch_size: usize,
}

impl StateFetcher {
    /// Creates a fetcher with the default rate, retry policy and batch size.
    #[must_use]
    pub fn new(client: Arc<dyn DescribeInstances>) -> Self {
        Self {
            client,
            limiter: Arc::new(TokenBucket::default()),
            policy: RetryPolicy::default(),
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Replaces the rate limiter.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the chunk size, clamped to `1..=MAX_BATCH_SIZE`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Configured retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Configured chunk size.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One permit, one describe call. Both race against cancellation.
    async fn describe_once(
        &self,
        target: &FetchTarget,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Ec2Instance>, FetchError> {
        let call = async {
            self.limiter.acquire().await;
            self.client.describe_instances(ids).await
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::cancelled(target.clone())),
            result = call => result.map_err(|e| FetchError::classify(target.clone(), e.message)),
        }
    }

    /// Waits out a backoff delay unless cancelled first.
    async fn backoff(
        target: &FetchTarget,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::cancelled(target.clone())),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[async_trait]
impl StateProvider for StateFetcher {
    async fn fetch_one(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<InstanceSnapshot, FetchError> {
        let target = FetchTarget::Instance(instance_id.to_string());
        let ids = [instance_id.to_string()];
        let attempts = self.policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.policy.delay_for(attempt - 1);
                debug!(
                    instance_id,
                    attempt,
                    backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Backing off before retry"
                );
                Self::backoff(&target, delay, cancel).await?;
            }

            match self.describe_once(&target, &ids, cancel).await {
                Ok(instances) => {
                    return instances
                        .iter()
                        .find(|i| i.id() == instance_id)
                        .map(InstanceSnapshot::from)
                        .ok_or_else(|| FetchError::not_found(instance_id));
                }
                Err(e) if e.retryable => {
                    warn!(
                        instance_id,
                        attempt,
                        error_class = %e.class,
                        "Retryable fetch failure: {}",
                        e.cause
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!(instance_id, error_class = %e.class, "Fetch failed: {}", e.cause);
                    return Err(e);
                }
            }
        }

        Err(match last_error {
            Some(last) => FetchError::exhausted(attempts, &last),
            None => FetchError::new(target, ErrorClass::Unknown, false, "no fetch attempt made"),
        })
    }

    async fn fetch_many(&self, instance_ids: &[String], cancel: &CancellationToken) -> BatchFetch {
        let chunk_count = instance_ids.len().div_ceil(self.batch_size);
        info!(
            "Fetching {} instance(s) in {} chunk(s)",
            instance_ids.len(),
            chunk_count
        );

        let mut result = BatchFetch::default();

        for (index, chunk) in instance_ids.chunks(self.batch_size).enumerate() {
            match self.describe_once(&FetchTarget::Batch, chunk, cancel).await {
                Ok(instances) => {
                    debug!(
                        "Chunk {}/{} returned {} instance(s)",
                        index + 1,
                        chunk_count,
                        instances.len()
                    );
                    for instance in &instances {
                        result
                            .snapshots
                            .insert(instance.id().to_string(), InstanceSnapshot::from(instance));
                    }
                }
                Err(e) => {
                    warn!(
                        error_class = %e.class,
                        "Chunk {}/{} failed: {}",
                        index + 1,
                        chunk_count,
                        e.cause
                    );
                    result.chunk_errors.push(e);
                }
            }
        }

        result
    }
}
