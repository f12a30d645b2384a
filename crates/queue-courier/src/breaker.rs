//! Circuit breaker guarding the queue send path.
//!
//! A first-class three-state machine rather than a black-box combinator:
//! state is externally observable for health reporting, transitions are
//! driven by an injected [`Clock`] so tests control timing, and the
//! recording API lets the pipeline report the outcome of a whole retry
//! sequence as a single result.
//!
//! # States
//!
//! - **Closed**: normal operation, consecutive failures counted
//! - **Open**: fail-fast for the configured break duration
//! - **HalfOpen**: exactly one probe attempt allowed; success closes the
//!   circuit, failure re-opens it and restarts the break timer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::BreakerSettings;
use crate::error::SendError;

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;

// ============================================================================
// Circuit State
// ============================================================================

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, requests pass through.
    Closed,

    /// Fail-fast mode, requests rejected until the break duration elapses.
    Open,

    /// Probing recovery, exactly one trial request allowed.
    HalfOpen,
}

impl CircuitState {
    /// Check if requests are allowed in the current state.
    pub fn allows_requests(&self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }
}

// ============================================================================
// Internal State
// ============================================================================

#[derive(Debug)]
struct InternalState {
    state: CircuitState,
    consecutive_failures: u32,
    /// Break deadline; set whenever the circuit opens.
    open_until: Option<DateTime<Utc>>,
    /// Whether the single half-open probe slot is taken.
    probe_in_flight: bool,
}

impl InternalState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            open_until: None,
            probe_in_flight: false,
        }
    }
}

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Thread-safe circuit breaker with observable state.
pub struct CircuitBreaker {
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<InternalState>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state.
    pub fn new(settings: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            state: Mutex::new(InternalState::new()),
        }
    }

    /// Current effective state, without attempting a send.
    ///
    /// An open circuit whose break deadline has elapsed reports (and
    /// becomes) half-open. Lock poisoning is treated as open.
    pub fn state(&self) -> CircuitState {
        match self.state.lock() {
            Ok(mut guard) => {
                self.roll_state(&mut guard);
                guard.state
            }
            Err(_) => CircuitState::Open,
        }
    }

    /// Consecutive non-cancellation failures recorded so far.
    pub fn consecutive_failures(&self) -> u32 {
        self.state
            .lock()
            .map(|guard| guard.consecutive_failures)
            .unwrap_or(0)
    }

    /// Ask permission for one attempt.
    ///
    /// # Returns
    ///
    /// - `Ok(permit)`: attempt admitted; report the outcome via exactly one
    ///   of [`BreakerPermit::success`], [`BreakerPermit::failure`], or
    ///   [`BreakerPermit::cancelled`]. Dropping the permit unrecorded
    ///   counts as a cancellation, so an abandoned attempt releases the
    ///   half-open probe slot instead of wedging it.
    /// - `Err(SendError::CircuitOpen)`: circuit is open, or the half-open
    ///   probe slot is already taken
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, SendError> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => return Err(SendError::CircuitOpen),
        };

        self.roll_state(&mut guard);

        match guard.state {
            CircuitState::Closed => {}
            CircuitState::Open => return Err(SendError::CircuitOpen),
            CircuitState::HalfOpen => {
                if guard.probe_in_flight {
                    return Err(SendError::CircuitOpen);
                }
                guard.probe_in_flight = true;
            }
        }

        Ok(BreakerPermit {
            breaker: self,
            recorded: false,
        })
    }

    /// Report a successful attempt.
    fn record_success(&self) {
        let Ok(mut guard) = self.state.lock() else {
            return;
        };

        if guard.state == CircuitState::HalfOpen {
            info!("circuit breaker closed after successful probe");
            guard.state = CircuitState::Closed;
            guard.open_until = None;
        }
        guard.consecutive_failures = 0;
        guard.probe_in_flight = false;
    }

    fn record_failure(&self) {
        let Ok(mut guard) = self.state.lock() else {
            return;
        };

        match guard.state {
            CircuitState::Closed => {
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.settings.failure_threshold {
                    self.trip(&mut guard);
                }
            }
            CircuitState::HalfOpen => {
                // Probe failed; re-open and restart the break timer.
                guard.consecutive_failures += 1;
                self.trip(&mut guard);
            }
            CircuitState::Open => {}
        }
        guard.probe_in_flight = false;
    }

    fn record_cancelled(&self) {
        let Ok(mut guard) = self.state.lock() else {
            return;
        };
        guard.probe_in_flight = false;
    }

    /// Transition an elapsed open circuit to half-open.
    fn roll_state(&self, guard: &mut InternalState) {
        if guard.state != CircuitState::Open {
            return;
        }
        let elapsed = guard
            .open_until
            .map(|deadline| self.clock.now() >= deadline)
            .unwrap_or(true);
        if elapsed {
            guard.state = CircuitState::HalfOpen;
            guard.open_until = None;
            guard.probe_in_flight = false;
        }
    }

    fn trip(&self, guard: &mut InternalState) {
        warn!(
            consecutive_failures = guard.consecutive_failures,
            break_duration_secs = self.settings.break_duration.as_secs(),
            "circuit breaker opened"
        );
        guard.state = CircuitState::Open;
        guard.open_until = Some(
            self.clock.now()
                + chrono::Duration::from_std(self.settings.break_duration)
                    .unwrap_or_else(|_| chrono::Duration::max_value()),
        );
        guard.probe_in_flight = false;
    }
}

// ============================================================================
// Breaker Permit
// ============================================================================

/// Outcome slot for one admitted attempt.
///
/// A cancellation is reported via [`cancelled`](Self::cancelled) rather
/// than [`failure`](Self::failure): a caller cancelling its own request
/// says nothing about service health. A permit dropped without recording
/// an outcome, such as when the owning future is abandoned, is treated
/// as a cancellation.
#[must_use = "the attempt outcome must be recorded on this permit"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    recorded: bool,
}

impl BreakerPermit<'_> {
    /// Report the attempt as successful.
    pub fn success(mut self) {
        self.recorded = true;
        self.breaker.record_success();
    }

    /// Report the attempt as failed.
    pub fn failure(mut self) {
        self.recorded = true;
        self.breaker.record_failure();
    }

    /// Report the attempt as cancelled, releasing the half-open probe
    /// slot without counting a failure.
    pub fn cancelled(mut self) {
        self.recorded = true;
        self.breaker.record_cancelled();
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.record_cancelled();
        }
    }
}
