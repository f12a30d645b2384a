//! Token issuer collaborator interface.
//!
//! The issuer is consumed through a narrow trait: given a role and a
//! per-request session name it returns temporary credentials or a raw
//! [`CollaboratorError`]. The wire protocol belongs to the implementation
//! (see [`crate::providers`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RoleDescriptor;
use crate::error::CollaboratorError;

#[cfg(test)]
#[path = "issuer_tests.rs"]
mod tests;

// ============================================================================
// Temporary Credentials
// ============================================================================

/// Short-lived credentials returned by the token issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    /// Access key identifier.
    pub access_key_id: String,

    /// Secret access key.
    pub secret_access_key: String,

    /// Session token bound to the assumed role.
    pub session_token: String,

    /// When the issuer says the credentials stop working.
    pub expires_at: DateTime<Utc>,
}

impl TemporaryCredentials {
    /// Check whether the credentials can actually sign requests.
    ///
    /// An issuer response with an empty key pair is treated as no
    /// credentials at all and surfaces as `InvalidLease`.
    pub fn is_usable(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

// ============================================================================
// Session Name
// ============================================================================

/// Role-session name generated per credential request.
///
/// Human-inspectable prefix plus a UUID suffix for uniqueness; used only
/// for auditability at the token issuer and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionName(String);

impl SessionName {
    /// Prefix identifying this crate in the issuer's audit trail.
    pub const PREFIX: &'static str = "queue-courier";

    /// Generate a fresh, unique session name.
    pub fn generate() -> Self {
        Self(format!("{}-{}", Self::PREFIX, Uuid::new_v4().simple()))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Token Issuer Trait
// ============================================================================

/// Interface to the token-issuing service.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Assume the given role and return temporary credentials.
    ///
    /// # Arguments
    ///
    /// * `role` - Validated role descriptor to assume
    /// * `session_name` - Per-request session name for auditability
    /// * `cancel` - Caller's cancellation signal
    ///
    /// # Returns
    ///
    /// Temporary credentials, or the issuer's raw failure for the caller
    /// to classify.
    async fn assume_role(
        &self,
        role: &RoleDescriptor,
        session_name: &SessionName,
        cancel: &CancellationToken,
    ) -> Result<TemporaryCredentials, CollaboratorError>;
}
