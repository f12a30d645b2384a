//! Tests for the in-memory collaborator implementations.

use super::*;

fn test_role() -> RoleDescriptor {
    RoleDescriptor::new("arn:aws:iam::123456789012:role/courier", "eu-west-1")
}

// ============================================================================
// Issuer Tests
// ============================================================================

mod issuer_tests {
    use super::*;

    /// Verify calls are counted and credentials differ per call.
    #[tokio::test]
    async fn test_issuer_counts_calls_and_issues_unique_credentials() {
        let issuer = MemoryTokenIssuer::new();
        let cancel = CancellationToken::new();

        let first = issuer
            .assume_role(&test_role(), &SessionName::generate(), &cancel)
            .await
            .expect("first call succeeds");
        let second = issuer
            .assume_role(&test_role(), &SessionName::generate(), &cancel)
            .await
            .expect("second call succeeds");

        assert_eq!(issuer.call_count(), 2);
        assert_ne!(first.access_key_id, second.access_key_id);
        assert!(first.is_usable());
    }

    /// Verify scripted failures are consumed in order, then successes resume.
    #[tokio::test]
    async fn test_scripted_failures_consumed_in_order() {
        let issuer = MemoryTokenIssuer::new();
        let cancel = CancellationToken::new();
        issuer.fail_next(transient_issuer_error("first"));

        let failure = issuer
            .assume_role(&test_role(), &SessionName::generate(), &cancel)
            .await;
        assert!(failure.is_err());

        let success = issuer
            .assume_role(&test_role(), &SessionName::generate(), &cancel)
            .await;
        assert!(success.is_ok());
    }

    /// Verify the mid-call cancellation switch fires the caller's token
    /// once, then normal behavior resumes.
    #[tokio::test]
    async fn test_cancel_caller_mid_call_fires_token_once() {
        let issuer = MemoryTokenIssuer::new();
        issuer.cancel_caller_mid_call();
        let cancel = CancellationToken::new();

        let result = issuer
            .assume_role(&test_role(), &SessionName::generate(), &cancel)
            .await;
        assert!(result.is_err());
        assert!(cancel.is_cancelled());

        let next = issuer
            .assume_role(&test_role(), &SessionName::generate(), &CancellationToken::new())
            .await;
        assert!(next.is_ok());
    }

    /// Verify the unusable-credentials switch empties the key pair.
    #[tokio::test]
    async fn test_unusable_credentials() {
        let issuer = MemoryTokenIssuer::new();
        issuer.issue_unusable();
        let cancel = CancellationToken::new();

        let credentials = issuer
            .assume_role(&test_role(), &SessionName::generate(), &cancel)
            .await
            .expect("call itself succeeds");
        assert!(!credentials.is_usable());
    }
}

// ============================================================================
// Queue Tests
// ============================================================================

mod queue_tests {
    use super::*;

    /// Verify sends are recorded with destination and payload.
    #[tokio::test]
    async fn test_queue_records_sends() {
        let factory = MemoryClientFactory::new();
        let queue = factory.queue();
        let cancel = CancellationToken::new();
        let credentials = TemporaryCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        };

        let client = factory
            .build_client(&credentials, "eu-west-1")
            .await
            .expect("build succeeds");
        let receipt = client
            .send("https://queue.example/outbox", "hello", &cancel)
            .await
            .expect("send succeeds");

        assert!(!receipt.message_id.as_str().is_empty());
        assert_eq!(queue.send_count(), 1);
        assert_eq!(
            queue.sends(),
            vec![SentMessage {
                destination: "https://queue.example/outbox".to_string(),
                payload: "hello".to_string(),
            }]
        );
    }

    /// Verify the receipt checksum is stable for identical payloads.
    #[tokio::test]
    async fn test_checksum_is_deterministic() {
        let queue = MemoryQueue::new();
        let first = queue.send("dest", "payload").await.expect("send");
        let second = queue.send("dest", "payload").await.expect("send");
        assert_eq!(first.checksum, second.checksum);
        assert_ne!(first.message_id, second.message_id);
    }

    /// Verify a scripted failure does not record a send.
    #[tokio::test]
    async fn test_scripted_failure_records_nothing() {
        let queue = MemoryQueue::new();
        queue.fail_next(denied_queue_error("denied"));

        let result = queue.send("dest", "payload").await;
        assert!(result.is_err());
        assert_eq!(queue.send_count(), 0);
    }

    /// Verify every build produces a distinct client over the same queue.
    #[tokio::test]
    async fn test_factory_builds_distinct_clients_over_shared_queue() {
        let factory = MemoryClientFactory::new();
        let cancel = CancellationToken::new();
        let credentials = TemporaryCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        };

        let first = factory
            .build_client(&credentials, "eu-west-1")
            .await
            .expect("build");
        let second = factory
            .build_client(&credentials, "eu-west-1")
            .await
            .expect("build");

        assert_eq!(factory.build_count(), 2);
        assert!(!Arc::ptr_eq(&first, &second));

        first.send("dest", "a", &cancel).await.expect("send");
        second.send("dest", "b", &cancel).await.expect("send");
        assert_eq!(factory.queue().send_count(), 2);
    }
}
