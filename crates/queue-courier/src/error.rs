//! Error types and failure classification for the send path.
//!
//! Raw collaborator failures are wrapped into the [`SendError`] taxonomy at
//! the point they cross into this crate, so internal logic branches on tags
//! rather than on inspecting external error payloads. The one exception is
//! the credential-expiry heuristic, which is a best-effort string match
//! against the collaborator's message and is kept in a single function here
//! so it can be refined without touching call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

// ============================================================================
// Collaborator Failures
// ============================================================================

/// External system a raw failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollaboratorKind {
    /// The token-issuing service (role assumption).
    TokenIssuer,
    /// The queue service (message send).
    QueueClient,
}

impl CollaboratorKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenIssuer => "token-issuer",
            Self::QueueClient => "queue-client",
        }
    }
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw failure reported by a collaborator, before classification.
///
/// Carries whatever status and message the collaborator exposed. Converted
/// into a [`SendError`] via [`SendError::classify`] at the boundary.
#[derive(Debug, Clone, Error)]
#[error("{service} request failed: {message}")]
pub struct CollaboratorError {
    /// Which collaborator failed.
    pub service: CollaboratorKind,

    /// HTTP-class status code, when the collaborator exposed one.
    pub status: Option<u16>,

    /// Error payload as reported by the collaborator.
    pub message: String,
}

impl CollaboratorError {
    /// Create a failure without a status code.
    pub fn new(service: CollaboratorKind, message: impl Into<String>) -> Self {
        Self {
            service,
            status: None,
            message: message.into(),
        }
    }

    /// Attach a status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

// ============================================================================
// Send Error Taxonomy
// ============================================================================

/// Error taxonomy for the queue send path.
///
/// Callers see either a receipt or one of these conditions; collaborator
/// failures that match none of the retryable classes propagate as
/// [`SendError::Unclassified`] with their original message intact.
#[derive(Debug, Error)]
pub enum SendError {
    /// Input validation failed before any I/O.
    #[error("invalid argument: '{field}' must not be empty")]
    InvalidArgument { field: String },

    /// The token issuer returned no usable credentials.
    #[error("token issuer returned no usable credentials: {message}")]
    InvalidLease { message: String },

    /// Retryable collaborator failure (server-side or timeout-class status).
    #[error("transient {service} failure: {message}")]
    Transient {
        service: CollaboratorKind,
        message: String,
    },

    /// Send-time failure classified as credential expiry; triggers exactly
    /// one forced refresh and retry.
    #[error("credential expired or invalid: {message}")]
    CredentialExpired { message: String },

    /// Circuit breaker rejected the attempt without contacting collaborators.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The pipeline-level deadline elapsed.
    #[error("send timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The caller cancelled the operation.
    #[error("operation cancelled by caller")]
    Cancelled,

    /// Collaborator failure matching none of the other classes.
    #[error("{service} failure: {message}")]
    Unclassified {
        service: CollaboratorKind,
        message: String,
    },
}

impl SendError {
    /// Classify a raw collaborator failure into the taxonomy.
    ///
    /// The credential-expiry heuristic takes precedence over the generic
    /// status check: a 503 whose body mentions an expired security token
    /// should prompt a credential refresh, not just a blind retry.
    pub fn classify(raw: CollaboratorError) -> Self {
        if is_credential_related(&raw.message) {
            return Self::CredentialExpired {
                message: raw.message,
            };
        }

        match raw.status {
            Some(500) | Some(503) | Some(408) => Self::Transient {
                service: raw.service,
                message: raw.message,
            },
            _ => Self::Unclassified {
                service: raw.service,
                message: raw.message,
            },
        }
    }

    /// Check if error is transient and worth retrying with backoff.
    ///
    /// Used for lease-acquisition retries; credential-expiry failures count
    /// as transient there because a fresh credential request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::CredentialExpired { .. }
        )
    }

    /// Check if error should count toward the circuit breaker's failure
    /// threshold.
    ///
    /// A caller cancelling its own request is not evidence of service
    /// unavailability, and a breaker rejection is not a new failure.
    pub fn counts_toward_breaker(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::CircuitOpen)
    }
}

// ============================================================================
// Credential-Expiry Heuristic
// ============================================================================

/// Best-effort check for credential-related failure messages.
///
/// Matches security-token problems (expired or invalid) and downstream
/// service-unavailability. The latter is semantically an availability
/// failure, not an auth failure; the conflation is historical and is
/// preserved (see DESIGN.md). String matching against an opaque payload is
/// inherently heuristic, so every pattern lives in this one function.
pub(crate) fn is_credential_related(message: &str) -> bool {
    let message = message.to_ascii_lowercase();

    let token_problem = message.contains("security token")
        && (message.contains("expired") || message.contains("invalid"));

    token_problem
        || message.contains("expiredtoken")
        || message.contains("invalidclienttokenid")
        || message.contains("token included in the request is expired")
        || message.contains("service unavailable")
}
