//! EC2 API client.
//!
//! Wraps the AWS SDK `DescribeInstances` call behind the [`DescribeInstances`]
//! trait so the fetcher can be exercised without network access. SDK-level
//! retries are disabled; retrying is owned by the fetcher.

use async_trait::async_trait;
use aws_sdk_ec2::config::retry::RetryConfig;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::Client;
use thiserror::Error;
use tracing::{debug, trace};

use super::types::{Ec2Instance, GroupIdentifier, Monitoring, MonitoringState, Placement, Tag};

/// Raw failure reported by the provider, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Provider message, usually `code: message`.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Looks up instances by id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DescribeInstances: Send + Sync {
    /// Describes the given instances in a single call.
    ///
    /// Instances unknown to the provider may be omitted from the result or
    /// reported as an error, depending on the provider.
    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<Ec2Instance>, ProviderError>;
}

/// `DescribeInstances` backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct Ec2DescribeClient {
    client: Client,
}

impl Ec2DescribeClient {
    /// Creates a client from the ambient AWS environment.
    ///
    /// Credentials come from the standard provider chain; `profile` selects a
    /// named profile from the shared config files.
    pub async fn new(region: &str, profile: Option<&str>) -> Self {
        let mut loader = aws_config::from_env()
            .region(aws_config::Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled());

        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }

        let config = loader.load().await;
        debug!("EC2 client configured for region {region}");

        Self {
            client: Client::new(&config),
        }
    }

    /// Wraps a pre-built SDK client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DescribeInstances for Ec2DescribeClient {
    async fn describe_instances(&self, ids: &[String]) -> Result<Vec<Ec2Instance>, ProviderError> {
        trace!("DescribeInstances for {} id(s)", ids.len());

        let output = self
            .client
            .describe_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|e| render_sdk_error(&e))?;

        let instances: Vec<Ec2Instance> = output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .map(Ec2Instance::from)
            .collect();

        trace!("DescribeInstances returned {} instance(s)", instances.len());
        Ok(instances)
    }
}

/// Renders an SDK error as `code: message` when the service supplied both.
fn render_sdk_error<E, R>(err: &SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => {
            ProviderError::new(format!("request timeout: {}", DisplayErrorContext(err)))
        }
        SdkError::DispatchFailure(_) => {
            ProviderError::new(format!("connection failure: {}", DisplayErrorContext(err)))
        }
        _ => match (err.code(), err.message()) {
            (Some(code), Some(message)) => ProviderError::new(format!("{code}: {message}")),
            (Some(code), None) => ProviderError::new(code),
            _ => ProviderError::new(DisplayErrorContext(err).to_string()),
        },
    }
}

impl From<&aws_sdk_ec2::types::Instance> for Ec2Instance {
    fn from(instance: &aws_sdk_ec2::types::Instance) -> Self {
        Self {
            instance_id: instance.instance_id().map(str::to_string),
            instance_type: instance.instance_type().map(|t| t.as_str().to_string()),
            placement: instance.placement().map(|p| Placement {
                availability_zone: p.availability_zone().map(str::to_string),
            }),
            security_groups: instance
                .security_groups()
                .iter()
                .map(|g| GroupIdentifier {
                    group_id: g.group_id().map(str::to_string),
                    group_name: g.group_name().map(str::to_string),
                })
                .collect(),
            tags: instance
                .tags()
                .iter()
                .map(|t| Tag {
                    key: t.key().map(str::to_string),
                    value: t.value().map(str::to_string),
                })
                .collect(),
            subnet_id: instance.subnet_id().map(str::to_string),
            image_id: instance.image_id().map(str::to_string),
            key_name: instance.key_name().map(str::to_string),
            monitoring: instance.monitoring().map(|m| Monitoring {
                state: m.state().and_then(|s| monitoring_state(s.as_str())),
            }),
        }
    }
}

fn monitoring_state(raw: &str) -> Option<MonitoringState> {
    match raw {
        "disabled" => Some(MonitoringState::Disabled),
        "disabling" => Some(MonitoringState::Disabling),
        "enabled" => Some(MonitoringState::Enabled),
        "pending" => Some(MonitoringState::Pending),
        _ => None,
    }
}
