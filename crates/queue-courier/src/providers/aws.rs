//! AWS-backed collaborator implementations.
//!
//! [`StsTokenIssuer`] assumes the trust role through AWS STS and
//! [`SqsClientFactory`] builds an SQS client from the temporary
//! credentials it returns. SDK failures are flattened into
//! [`CollaboratorError`] with their HTTP status attached where one exists,
//! so classification stays inside the core.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientFactory, MessageId, QueueClient, SendReceipt};
use crate::config::RoleDescriptor;
use crate::error::{CollaboratorError, CollaboratorKind};
use crate::issuer::{SessionName, TemporaryCredentials, TokenIssuer};

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

// ============================================================================
// SDK Error Mapping
// ============================================================================

/// Flatten an SDK failure into a raw collaborator error.
fn from_sdk_error<E>(
    service: CollaboratorKind,
    error: &SdkError<E, HttpResponse>,
) -> CollaboratorError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = match error {
        SdkError::ServiceError(context) => Some(context.raw().status().as_u16()),
        SdkError::ResponseError(context) => Some(context.raw().status().as_u16()),
        SdkError::TimeoutError(_) => Some(408),
        _ => None,
    };

    let mut mapped = CollaboratorError::new(service, DisplayErrorContext(error).to_string());
    if let Some(status) = status {
        mapped = mapped.with_status(status);
    }
    mapped
}

// ============================================================================
// STS Token Issuer
// ============================================================================

/// Token issuer backed by AWS STS `AssumeRole`.
pub struct StsTokenIssuer {
    client: aws_sdk_sts::Client,
}

impl StsTokenIssuer {
    /// Wrap an existing STS client.
    pub fn new(client: aws_sdk_sts::Client) -> Self {
        Self { client }
    }

    /// Build an issuer from the ambient AWS environment.
    pub async fn from_env(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(aws_sdk_sts::Client::new(&config))
    }
}

#[async_trait]
impl TokenIssuer for StsTokenIssuer {
    async fn assume_role(
        &self,
        role: &RoleDescriptor,
        session_name: &SessionName,
        cancel: &CancellationToken,
    ) -> Result<TemporaryCredentials, CollaboratorError> {
        let request = self
            .client
            .assume_role()
            .role_arn(&role.role_arn)
            .role_session_name(session_name.as_str())
            .send();

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(CollaboratorError::new(
                    CollaboratorKind::TokenIssuer,
                    "assume-role request aborted by caller",
                ));
            }
            result = request => {
                result.map_err(|error| from_sdk_error(CollaboratorKind::TokenIssuer, &error))?
            }
        };

        // A response without credentials maps to an empty key pair so the
        // lease manager, not this provider, decides it is an invalid lease.
        let Some(credentials) = output.credentials() else {
            return Ok(TemporaryCredentials {
                access_key_id: String::new(),
                secret_access_key: String::new(),
                session_token: String::new(),
                expires_at: Utc::now(),
            });
        };

        let expiration = credentials.expiration();
        let expires_at = Utc
            .timestamp_opt(expiration.secs(), expiration.subsec_nanos())
            .single()
            .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));

        Ok(TemporaryCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expires_at,
        })
    }
}

// ============================================================================
// SQS Client Factory
// ============================================================================

/// Builds SQS clients bound to freshly issued credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqsClientFactory;

impl SqsClientFactory {
    /// Create a factory.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClientFactory for SqsClientFactory {
    async fn build_client(
        &self,
        credentials: &TemporaryCredentials,
        region: &str,
    ) -> Result<Arc<dyn QueueClient>, CollaboratorError> {
        let provider = aws_sdk_sqs::config::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            Some(SystemTime::from(credentials.expires_at)),
            "queue-courier-lease",
        );

        let config = aws_sdk_sqs::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(provider)
            .build();

        Ok(Arc::new(SqsQueueClient::new(
            aws_sdk_sqs::Client::from_conf(config),
        )))
    }
}

// ============================================================================
// SQS Queue Client
// ============================================================================

/// Queue client backed by AWS SQS `SendMessage`.
#[derive(Debug)]
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueClient {
    /// Wrap an existing SQS client.
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn send(
        &self,
        destination: &str,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, CollaboratorError> {
        let request = self
            .client
            .send_message()
            .queue_url(destination)
            .message_body(payload)
            .send();

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(CollaboratorError::new(
                    CollaboratorKind::QueueClient,
                    "send-message request aborted by caller",
                ));
            }
            result = request => {
                result.map_err(|error| from_sdk_error(CollaboratorKind::QueueClient, &error))?
            }
        };

        Ok(SendReceipt {
            message_id: MessageId::new(output.message_id().unwrap_or_default()),
            checksum: output.md5_of_message_body().unwrap_or_default().to_string(),
        })
    }
}
