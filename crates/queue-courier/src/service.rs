//! Queue send service façade.
//!
//! The public surface of the crate: validates input before any I/O,
//! consults the credential lease manager for a usable client, and executes
//! the send through the resilience pipeline. Failures that survive the
//! pipeline are logged and re-raised unchanged so callers can distinguish
//! root causes.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::breaker::CircuitState;
use crate::client::SendReceipt;
use crate::error::SendError;
use crate::lease::CredentialLeaseManager;
use crate::pipeline::ResiliencePipeline;

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;

/// Public-facing send operation over the credential-refreshing client.
pub struct QueueSendService {
    leases: Arc<CredentialLeaseManager>,
    pipeline: ResiliencePipeline,
}

impl QueueSendService {
    /// Create a service over the given lease manager and pipeline.
    pub fn new(leases: Arc<CredentialLeaseManager>, pipeline: ResiliencePipeline) -> Self {
        Self { leases, pipeline }
    }

    /// Send one payload to the given destination.
    ///
    /// # Arguments
    ///
    /// * `destination` - Queue the message goes to
    /// * `payload` - Message body
    /// * `cancel` - Caller's cancellation signal
    ///
    /// # Returns
    ///
    /// The queue service's receipt, unchanged.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` naming the field, before any network activity
    /// - `CircuitOpen` while the breaker rejects attempts
    /// - `Cancelled` when the caller's token fires, propagated unwrapped
    /// - otherwise the original classified failure, re-raised unchanged
    pub async fn send(
        &self,
        destination: &str,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, SendError> {
        validate_non_empty("destination", destination)?;
        validate_non_empty("payload", payload)?;

        if cancel.is_cancelled() {
            return Err(SendError::Cancelled);
        }

        match self
            .pipeline
            .execute(&self.leases, destination, payload, cancel)
            .await
        {
            Ok(receipt) => {
                debug!(message_id = %receipt.message_id, "message accepted by queue");
                Ok(receipt)
            }
            Err(SendError::Cancelled) => Err(SendError::Cancelled),
            Err(other) => {
                error!(error = %other, destination, "queue send failed");
                Err(other)
            }
        }
    }

    /// Report whether the send path is currently usable.
    ///
    /// Exercises real lease acquisition so the signal reflects true
    /// reachability of the credential chain. Never raises: every failure,
    /// including the caller's own cancellation, reports as `false`.
    pub async fn is_healthy(&self, cancel: &CancellationToken) -> bool {
        // HalfOpen counts as probing, optimistically healthy.
        if self.breaker_state() == CircuitState::Open {
            return false;
        }
        self.leases.acquire(cancel).await.is_ok()
    }

    /// Current breaker state, for health endpoints.
    pub fn breaker_state(&self) -> CircuitState {
        self.pipeline.breaker().state()
    }
}

/// Reject empty input before any lease or network activity.
fn validate_non_empty(field: &str, value: &str) -> Result<(), SendError> {
    if value.is_empty() {
        return Err(SendError::InvalidArgument {
            field: field.to_string(),
        });
    }
    Ok(())
}
