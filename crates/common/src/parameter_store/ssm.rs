//! AWS Systems Manager Parameter Store backend.

use super::{ParameterStore, StoreError};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client as SsmClient;
use std::time::Duration;
use tracing::{debug, info};

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Parameter store backed by SSM `SecureString` parameters.
///
/// Reads request decryption; writes overwrite in place.
#[derive(Debug, Clone)]
pub struct SsmParameterStore {
    client: SsmClient,
}

impl SsmParameterStore {
    /// Build a client from the ambient AWS configuration.
    ///
    /// `endpoint_url` points the client at an AWS-compatible emulator
    /// (e.g. `http://localhost:4566`) instead of the regional endpoint.
    /// Each SDK operation, retries included, is capped at `operation_timeout`.
    pub async fn connect(
        region: &str,
        endpoint_url: Option<&str>,
        operation_timeout: Duration,
    ) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(operation_timeout)
            .build();
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .timeout_config(timeouts);

        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        info!(
            target: "common.parameter_store",
            backend = "ssm",
            region = %region,
            custom_endpoint = endpoint_url.is_some(),
            operation_timeout_ms = u64::try_from(operation_timeout.as_millis()).unwrap_or(u64::MAX),
            "Initialized SSM parameter store"
        );

        Self::from_client(SsmClient::new(&sdk_config))
    }

    /// Wrap an already configured SSM client.
    #[must_use]
    pub fn from_client(client: SsmClient) -> Self {
        Self { client }
    }
}

/// Map an SDK failure onto `StoreError`, keeping the full error chain text.
fn map_sdk_error<E, R>(err: &SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(err).to_string();
    match err.as_service_error().and_then(ProvideErrorMetadata::code) {
        Some("AccessDeniedException" | "AccessDenied") => StoreError::AccessDenied(detail),
        _ => StoreError::Backend(detail),
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    #[tracing::instrument(skip(self), fields(backend = "ssm"))]
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        match self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|p| p.value())
                .map(ToString::to_string)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetParameterError::is_parameter_not_found) =>
            {
                debug!(target: "common.parameter_store", parameter = %name, "Parameter not found");
                Ok(None)
            }
            Err(err) => Err(map_sdk_error(&err)),
        }
    }

    #[tracing::instrument(skip(self, value), fields(backend = "ssm"))]
    async fn put(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(true)
            .send()
            .await
            .map_err(|err| map_sdk_error(&err))?;

        debug!(target: "common.parameter_store", parameter = %name, "Parameter written");
        Ok(())
    }
}
