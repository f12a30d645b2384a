//! Tests for the circuit breaker state machine.
//!
//! All timing is driven through [`ManualClock`]; no test sleeps.

use super::*;
use crate::clock::ManualClock;
use chrono::Duration as ChronoDuration;
use std::time::Duration;

fn test_breaker(threshold: u32, break_secs: u64) -> (CircuitBreaker, ManualClock) {
    let clock = ManualClock::new();
    let settings = BreakerSettings {
        failure_threshold: threshold,
        break_duration: Duration::from_secs(break_secs),
    };
    let breaker = CircuitBreaker::new(settings, Arc::new(clock.clone()));
    (breaker, clock)
}

/// Drive the breaker through `count` admitted failures.
fn fail_times(breaker: &CircuitBreaker, count: u32) {
    for _ in 0..count {
        breaker
            .try_acquire()
            .expect("attempt should be admitted")
            .failure();
    }
}

// ============================================================================
// Closed State Tests
// ============================================================================

mod closed_state_tests {
    use super::*;

    /// Verify the initial state is closed and admits requests.
    #[test]
    fn test_initial_state_is_closed() {
        let (breaker, _clock) = test_breaker(5, 60);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.state().allows_requests());
        assert!(breaker.try_acquire().is_ok());
    }

    /// Verify failures below the threshold keep the circuit closed.
    #[test]
    fn test_failures_below_threshold_stay_closed() {
        let (breaker, _clock) = test_breaker(5, 60);
        fail_times(&breaker, 4);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 4);
    }

    /// Verify a success resets the consecutive-failure count.
    #[test]
    fn test_success_resets_failure_count() {
        let (breaker, _clock) = test_breaker(5, 60);
        fail_times(&breaker, 3);

        breaker.try_acquire().expect("admitted").success();

        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}

// ============================================================================
// Tripping Tests
// ============================================================================

mod tripping_tests {
    use super::*;

    /// Verify five consecutive failures open the circuit.
    #[test]
    fn test_threshold_failures_trip_circuit() {
        let (breaker, _clock) = test_breaker(5, 60);
        fail_times(&breaker, 5);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    /// Verify an open circuit rejects attempts with `CircuitOpen`.
    #[test]
    fn test_open_circuit_rejects_attempts() {
        let (breaker, _clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);

        assert!(matches!(
            breaker.try_acquire(),
            Err(SendError::CircuitOpen)
        ));
    }

    /// Verify the circuit stays open while the break duration runs.
    #[test]
    fn test_circuit_stays_open_during_break() {
        let (breaker, clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);

        clock.advance(ChronoDuration::seconds(59));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_err());
    }
}

// ============================================================================
// Half-Open Tests
// ============================================================================

mod half_open_tests {
    use super::*;

    /// Verify the break deadline moves the circuit to half-open, observable
    /// without attempting a send.
    #[test]
    fn test_break_elapse_reports_half_open() {
        let (breaker, clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);

        clock.advance(ChronoDuration::seconds(60));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    /// Verify exactly one probe is admitted while half-open.
    #[test]
    fn test_half_open_admits_single_probe() {
        let (breaker, clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);
        clock.advance(ChronoDuration::seconds(61));

        let probe = breaker.try_acquire().expect("probe admitted");
        // Second caller while the probe is in flight is rejected.
        assert!(matches!(
            breaker.try_acquire(),
            Err(SendError::CircuitOpen)
        ));
        drop(probe);
    }

    /// Verify a successful probe closes the circuit and resets the count.
    #[test]
    fn test_probe_success_closes_circuit() {
        let (breaker, clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);
        clock.advance(ChronoDuration::seconds(61));

        breaker.try_acquire().expect("probe admitted").success();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.try_acquire().is_ok());
    }

    /// Verify a failed probe re-opens the circuit and restarts the timer.
    #[test]
    fn test_probe_failure_reopens_and_restarts_timer() {
        let (breaker, clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);
        clock.advance(ChronoDuration::seconds(61));

        breaker.try_acquire().expect("probe admitted").failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // The timer restarted at the probe failure, not the original trip.
        clock.advance(ChronoDuration::seconds(59));
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(ChronoDuration::seconds(2));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }
}

// ============================================================================
// Cancellation Tests
// ============================================================================

mod cancellation_tests {
    use super::*;

    /// Verify cancellations never count toward the failure threshold.
    #[test]
    fn test_cancellation_does_not_count_as_failure() {
        let (breaker, _clock) = test_breaker(2, 60);

        for _ in 0..5 {
            breaker.try_acquire().expect("admitted").cancelled();
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    /// Verify a cancelled probe releases the half-open slot so the next
    /// caller can probe.
    #[test]
    fn test_cancelled_probe_releases_slot() {
        let (breaker, clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);
        clock.advance(ChronoDuration::seconds(61));

        breaker.try_acquire().expect("probe admitted").cancelled();

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_ok());
    }
}

// ============================================================================
// Permit Drop Tests
// ============================================================================

mod permit_drop_tests {
    use super::*;

    /// Verify a half-open probe permit dropped without an outcome releases
    /// the slot so the next caller can probe.
    #[test]
    fn test_dropped_probe_permit_releases_slot() {
        let (breaker, clock) = test_breaker(2, 60);
        fail_times(&breaker, 2);
        clock.advance(ChronoDuration::seconds(61));

        let probe = breaker.try_acquire().expect("probe admitted");
        drop(probe);

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_ok());
    }

    /// Verify dropped permits never count toward the failure threshold.
    #[test]
    fn test_dropped_permit_is_not_a_failure() {
        let (breaker, _clock) = test_breaker(2, 60);

        for _ in 0..5 {
            drop(breaker.try_acquire().expect("admitted"));
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }
}
