//! AWS EC2 integration module.
//!
//! This module provides everything needed to read live instance state from
//! EC2: the SDK-backed describe client, error classification, client-side
//! rate limiting, retry policy and the [`StateFetcher`] that ties them
//! together.

mod classify;
mod client;
mod fetcher;
mod rate_limit;
mod retry;
mod types;

pub use classify::{class_of, is_retryable};
pub use client::{DescribeInstances, Ec2DescribeClient, ProviderError};
pub use fetcher::{BatchFetch, MAX_BATCH_SIZE, StateFetcher, StateProvider};
pub use rate_limit::{DEFAULT_RATE_PER_SECOND, NoopRateLimiter, RateLimiter, TokenBucket};
pub use retry::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES, RetryPolicy};
pub use types::{Ec2Instance, GroupIdentifier, Monitoring, MonitoringState, Placement, Tag};

#[cfg(test)]
pub use fetcher::MockStateProvider;
