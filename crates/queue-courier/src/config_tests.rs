//! Tests for configuration types and their validation.

use super::*;

// ============================================================================
// Role Descriptor Tests
// ============================================================================

mod role_descriptor_tests {
    use super::*;

    /// Verify a fully populated descriptor validates.
    #[test]
    fn test_valid_descriptor() {
        let role = RoleDescriptor::new("arn:aws:iam::123456789012:role/courier", "eu-west-1");
        assert!(role.validate().is_ok());
    }

    /// Verify an empty role ARN is rejected by name.
    #[test]
    fn test_empty_role_arn_rejected() {
        let role = RoleDescriptor::new("", "eu-west-1");
        match role.validate() {
            Err(SendError::InvalidArgument { field }) => assert_eq!(field, "role_arn"),
            other => panic!("expected invalid argument, got {:?}", other),
        }
    }

    /// Verify an empty region is rejected by name.
    #[test]
    fn test_empty_region_rejected() {
        let role = RoleDescriptor::new("arn:aws:iam::123456789012:role/courier", "   ");
        match role.validate() {
            Err(SendError::InvalidArgument { field }) => assert_eq!(field, "region"),
            other => panic!("expected invalid argument, got {:?}", other),
        }
    }
}

// ============================================================================
// Settings Defaults Tests
// ============================================================================

mod settings_tests {
    use super::*;

    /// Verify lease defaults: 55-minute margin, 3 attempts, 2s base delay.
    #[test]
    fn test_lease_settings_defaults() {
        let settings = LeaseSettings::default();
        assert_eq!(settings.safety_margin, Duration::from_secs(55 * 60));
        assert_eq!(settings.max_acquire_retries, 3);
        assert_eq!(settings.backoff_base, Duration::from_secs(2));
    }

    /// Verify backoff doubles per attempt: 2s, 4s, 8s.
    #[test]
    fn test_backoff_delay_doubles() {
        let settings = LeaseSettings::default();
        assert_eq!(settings.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(settings.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(settings.backoff_delay(3), Duration::from_secs(8));
    }

    /// Verify breaker defaults: 5 failures, 1-minute break.
    #[test]
    fn test_breaker_settings_defaults() {
        let settings = BreakerSettings::default();
        assert_eq!(settings.failure_threshold, 5);
        assert_eq!(settings.break_duration, Duration::from_secs(60));
    }

    /// Verify the pipeline ceiling defaults to 30 seconds.
    #[test]
    fn test_resilience_settings_defaults() {
        let settings = ResilienceSettings::default();
        assert_eq!(settings.send_timeout, Duration::from_secs(30));
    }
}
