//! Configuration types for the send path.
//!
//! The role descriptor is supplied by reference from an external
//! configuration source and may be replaced while the service is running
//! (for example by a config-reload loop), so it is re-validated at every
//! credential acquisition rather than only at construction.

use crate::error::SendError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// ============================================================================
// Role Descriptor
// ============================================================================

/// Trust role to assume for queue credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// ARN of the role to assume.
    pub role_arn: String,

    /// Region the queue client is constructed for.
    pub region: String,
}

impl RoleDescriptor {
    /// Create a new role descriptor.
    pub fn new(role_arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            region: region.into(),
        }
    }

    /// Validate that both fields are present.
    ///
    /// Called before every credential request, not only at construction.
    pub fn validate(&self) -> Result<(), SendError> {
        if self.role_arn.trim().is_empty() {
            return Err(SendError::InvalidArgument {
                field: "role_arn".to_string(),
            });
        }
        if self.region.trim().is_empty() {
            return Err(SendError::InvalidArgument {
                field: "region".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Lease Settings
// ============================================================================

/// Configuration for credential lease refresh behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseSettings {
    /// How long an installed lease is served before a refresh.
    ///
    /// Strictly less than the credential's actual validity window to leave
    /// headroom for in-flight operations: 55 minutes against the 60-minute
    /// token lifetime.
    pub safety_margin: Duration,

    /// Maximum retries after a transient acquisition failure.
    pub max_acquire_retries: u32,

    /// Base delay for exponential backoff between acquisition attempts.
    ///
    /// Doubles per retry: 2s, 4s, 8s.
    pub backoff_base: Duration,
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            safety_margin: Duration::from_secs(55 * 60),
            max_acquire_retries: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl LeaseSettings {
    /// Backoff delay before the given retry (1-based attempt number).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

// ============================================================================
// Breaker Settings
// ============================================================================

/// Configuration for the circuit breaker state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive non-cancellation failures that trip the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before allowing a probe.
    pub break_duration: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            break_duration: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Resilience Settings
// ============================================================================

/// Configuration for the resilience pipeline around each send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Wall-clock ceiling for one logical send, including client
    /// acquisition and the credential-expiry retry.
    pub send_timeout: Duration,

    /// Circuit breaker configuration.
    pub breaker: BreakerSettings,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(30),
            breaker: BreakerSettings::default(),
        }
    }
}
