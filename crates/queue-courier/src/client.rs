//! Queue client collaborator interface.
//!
//! A [`QueueClient`] is an opaque send capability configured for one set of
//! credentials. Clients are built by a [`ClientFactory`] from the
//! credentials the token issuer handed out, and cached by the credential
//! lease manager until those credentials near expiry.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::CollaboratorError;
use crate::issuer::TemporaryCredentials;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// ============================================================================
// Message Identifier
// ============================================================================

/// Identifier the queue service assigned to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Create a message ID from the collaborator's value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Send Receipt
// ============================================================================

/// Acknowledgement returned by the queue service for one sent message.
///
/// Both fields are passed through exactly as the collaborator supplied
/// them; this crate adds nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Identifier assigned by the queue service.
    pub message_id: MessageId,

    /// Content checksum computed by the queue service.
    pub checksum: String,
}

// ============================================================================
// Queue Client Trait
// ============================================================================

/// Interface to the queue service's send operation.
#[async_trait]
pub trait QueueClient: Send + Sync + std::fmt::Debug {
    /// Send one payload to the given destination.
    ///
    /// # Arguments
    ///
    /// * `destination` - Queue the message goes to (already validated
    ///   non-empty by the façade)
    /// * `payload` - Message body
    /// * `cancel` - Caller's cancellation signal
    ///
    /// # Returns
    ///
    /// The service's receipt, or its raw failure for the caller to
    /// classify.
    async fn send(
        &self,
        destination: &str,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, CollaboratorError>;
}

// ============================================================================
// Client Factory Trait
// ============================================================================

/// Builds a configured queue client from freshly issued credentials.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Construct a client bound to the given credentials and region.
    async fn build_client(
        &self,
        credentials: &TemporaryCredentials,
        region: &str,
    ) -> Result<Arc<dyn QueueClient>, CollaboratorError>;
}
