//! Credential lease management.
//!
//! The manager owns exactly one cached queue client plus its credential
//! expiry, guarded by a single async mutex. Concurrent callers during an
//! in-flight refresh wait for and then share the resulting lease, so at
//! most one role-assumption call is ever in flight. A refresh either fully
//! replaces the lease or leaves the prior lease untouched.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{ClientFactory, QueueClient};
use crate::clock::Clock;
use crate::config::{LeaseSettings, RoleDescriptor};
use crate::error::SendError;
use crate::issuer::{SessionName, TokenIssuer};

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;

// ============================================================================
// Credential Lease
// ============================================================================

/// Cached client handle plus its validity deadline.
struct CredentialLease {
    client: Arc<dyn QueueClient>,
    expires_at: DateTime<Utc>,
}

// ============================================================================
// Credential Lease Manager
// ============================================================================

/// Serializes credential refresh and serves a non-expired client cheaply.
///
/// Instantiate one manager per [`QueueSendService`](crate::QueueSendService)
/// and inject it; the lease is an owned record behind a mutex, not a
/// global singleton.
pub struct CredentialLeaseManager {
    issuer: Arc<dyn TokenIssuer>,
    factory: Arc<dyn ClientFactory>,
    /// Shared by reference with the configuration source; may be replaced
    /// externally, so it is re-read and re-validated on every refresh.
    role: Arc<RwLock<RoleDescriptor>>,
    settings: LeaseSettings,
    clock: Arc<dyn Clock>,
    lease: Mutex<Option<CredentialLease>>,
}

impl CredentialLeaseManager {
    /// Create a manager with no lease installed.
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        factory: Arc<dyn ClientFactory>,
        role: Arc<RwLock<RoleDescriptor>>,
        settings: LeaseSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer,
            factory,
            role,
            settings,
            clock,
            lease: Mutex::new(None),
        }
    }

    /// Get a usable queue client, refreshing the lease if absent or expired.
    ///
    /// # Errors
    ///
    /// - `InvalidLease` when the issuer returns unusable credentials
    /// - `Cancelled` when the caller's token fires while waiting for the
    ///   mutex, before the network call, or during a backoff delay
    /// - the classified issuer/factory error otherwise, after transient
    ///   failures have been retried with backoff
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn QueueClient>, SendError> {
        let mut guard = self.lock_lease(cancel).await?;

        if let Some(lease) = guard.as_ref() {
            if self.clock.now() < lease.expires_at {
                return Ok(Arc::clone(&lease.client));
            }
        }

        self.refresh_locked(&mut guard, cancel).await
    }

    /// Refresh the lease unconditionally, regardless of expiry.
    ///
    /// Used when a caller has independent evidence the cached credential is
    /// invalid, such as an authorization failure from the queue client.
    /// Serialized against [`acquire`](Self::acquire) through the same mutex.
    pub async fn force_refresh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn QueueClient>, SendError> {
        let mut guard = self.lock_lease(cancel).await?;
        self.refresh_locked(&mut guard, cancel).await
    }

    /// Expiry of the currently installed lease, for health reporting.
    pub async fn lease_expiry(&self) -> Option<DateTime<Utc>> {
        self.lease.lock().await.as_ref().map(|lease| lease.expires_at)
    }

    /// Enter the exclusive section, honoring cancellation while waiting.
    async fn lock_lease(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, Option<CredentialLease>>, SendError> {
        if cancel.is_cancelled() {
            return Err(SendError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SendError::Cancelled),
            guard = self.lease.lock() => Ok(guard),
        }
    }

    /// Refresh while holding the exclusive section.
    ///
    /// Retries transient failures up to the configured retry count with
    /// doubling backoff. The lease slot is only written on success.
    async fn refresh_locked(
        &self,
        guard: &mut Option<CredentialLease>,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn QueueClient>, SendError> {
        let role = self
            .role
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        role.validate()?;

        let mut failed_attempts = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(SendError::Cancelled);
            }

            match self.request_lease(&role, cancel).await {
                Ok(lease) => {
                    let client = Arc::clone(&lease.client);
                    info!(
                        expires_at = %lease.expires_at,
                        "installed new credential lease"
                    );
                    *guard = Some(lease);
                    return Ok(client);
                }
                Err(SendError::Cancelled) => return Err(SendError::Cancelled),
                Err(error)
                    if error.is_transient()
                        && failed_attempts < self.settings.max_acquire_retries =>
                {
                    failed_attempts += 1;
                    let delay = self.settings.backoff_delay(failed_attempts);
                    warn!(
                        attempt = failed_attempts,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "transient credential acquisition failure, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SendError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// One role-assumption attempt plus client construction.
    async fn request_lease(
        &self,
        role: &RoleDescriptor,
        cancel: &CancellationToken,
    ) -> Result<CredentialLease, SendError> {
        let session_name = SessionName::generate();

        // The cancel branch goes first: when the token fires mid-call the
        // caller must see `Cancelled`, never the collaborator's abort error.
        let credentials = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SendError::Cancelled),
            result = self.issuer.assume_role(role, &session_name, cancel) => {
                result.map_err(SendError::classify)?
            }
        };

        if !credentials.is_usable() {
            return Err(SendError::InvalidLease {
                message: "issuer returned an empty access key or secret".to_string(),
            });
        }

        let client = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SendError::Cancelled),
            result = self.factory.build_client(&credentials, &role.region) => {
                result.map_err(SendError::classify)?
            }
        };

        // The installed expiry deliberately undercuts the credential's own
        // validity window to leave headroom for in-flight sends.
        let expires_at = self.clock.now()
            + chrono::Duration::from_std(self.settings.safety_margin)
                .unwrap_or_else(|_| chrono::Duration::minutes(55));

        Ok(CredentialLease { client, expires_at })
    }
}
