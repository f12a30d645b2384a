//! Resilience pipeline around the send operation.
//!
//! Three orthogonal failure modes, handled without conflation. Composition
//! order, outermost to innermost: timeout → circuit breaker → credential-
//! expiry retry → actual send. The breaker records the outcome of the
//! whole retry sequence, so a credential hiccup that self-heals via the
//! forced refresh does not count as a breaker failure, while the timeout
//! bounds the retry sequence as a whole.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::breaker::CircuitBreaker;
use crate::client::{QueueClient, SendReceipt};
use crate::clock::Clock;
use crate::config::ResilienceSettings;
use crate::error::SendError;
use crate::lease::CredentialLeaseManager;

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

/// Timeout, circuit breaker, and credential-expiry retry composed around a
/// single logical send.
pub struct ResiliencePipeline {
    breaker: CircuitBreaker,
    settings: ResilienceSettings,
}

impl ResiliencePipeline {
    /// Create a pipeline with a closed breaker.
    pub fn new(settings: ResilienceSettings, clock: Arc<dyn Clock>) -> Self {
        let breaker = CircuitBreaker::new(settings.breaker.clone(), clock);
        Self { breaker, settings }
    }

    /// The breaker, for state observation.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Execute one logical send through the full pipeline.
    ///
    /// The timeout ceiling covers client acquisition, the send, and any
    /// forced-refresh retry. Cancellation propagates unchanged and is
    /// reported to the breaker as a non-failure.
    pub async fn execute(
        &self,
        leases: &CredentialLeaseManager,
        destination: &str,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, SendError> {
        let permit = self.breaker.try_acquire()?;

        let outcome = match tokio::time::timeout(
            self.settings.send_timeout,
            self.send_with_credential_retry(leases, destination, payload, cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout {
                limit: self.settings.send_timeout,
            }),
        };

        match &outcome {
            Ok(_) => permit.success(),
            Err(SendError::Cancelled) => permit.cancelled(),
            Err(_) => permit.failure(),
        }

        outcome
    }

    /// Acquire a client and send, with exactly one forced-refresh retry on
    /// a credential-expired classification.
    ///
    /// A second credential-related failure propagates to the caller.
    async fn send_with_credential_retry(
        &self,
        leases: &CredentialLeaseManager,
        destination: &str,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, SendError> {
        let client = leases.acquire(cancel).await?;

        match self.attempt_send(&client, destination, payload, cancel).await {
            Err(SendError::CredentialExpired { message }) => {
                warn!(
                    error = %message,
                    "send classified as credential expiry, forcing refresh and retrying once"
                );
                let client = leases.force_refresh(cancel).await?;
                self.attempt_send(&client, destination, payload, cancel).await
            }
            other => other,
        }
    }

    /// One send attempt against an already-acquired client.
    async fn attempt_send(
        &self,
        client: &Arc<dyn QueueClient>,
        destination: &str,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, SendError> {
        if cancel.is_cancelled() {
            return Err(SendError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SendError::Cancelled),
            result = client.send(destination, payload, cancel) => {
                result.map_err(SendError::classify)
            }
        }
    }
}
