//! In-memory collaborator implementations for testing and development.
//!
//! Both providers record every call and support scripted failures, so
//! tests can drive the lease manager and resilience pipeline through
//! specific failure sequences deterministically. They are also usable as a
//! local stand-in while developing against the real services.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{ClientFactory, MessageId, QueueClient, SendReceipt};
use crate::config::RoleDescriptor;
use crate::error::{CollaboratorError, CollaboratorKind};
use crate::issuer::{SessionName, TemporaryCredentials, TokenIssuer};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Memory Token Issuer
// ============================================================================

#[derive(Default)]
struct IssuerState {
    scripted_failures: VecDeque<CollaboratorError>,
    issue_unusable: bool,
    cancel_caller_mid_call: bool,
}

/// Scriptable in-memory token issuer.
///
/// Issues credentials with a one-hour lifetime by default; failures and
/// unusable credentials can be queued per call.
pub struct MemoryTokenIssuer {
    state: Mutex<IssuerState>,
    call_count: AtomicU32,
}

impl MemoryTokenIssuer {
    /// Create an issuer that succeeds on every call.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IssuerState::default()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Queue a failure for the next role-assumption call.
    ///
    /// Queued failures are consumed in order before successes resume.
    pub fn fail_next(&self, error: CollaboratorError) {
        self.state
            .lock()
            .expect("issuer state lock poisoned")
            .scripted_failures
            .push_back(error);
    }

    /// Fire the caller's cancellation token during the next call, then
    /// fail it, simulating a caller that gives up while role assumption
    /// is in flight.
    pub fn cancel_caller_mid_call(&self) {
        self.state
            .lock()
            .expect("issuer state lock poisoned")
            .cancel_caller_mid_call = true;
    }

    /// Make every subsequent call return credentials with an empty key pair.
    pub fn issue_unusable(&self) {
        self.state
            .lock()
            .expect("issuer state lock poisoned")
            .issue_unusable = true;
    }

    /// Number of role-assumption calls made so far.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MemoryTokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenIssuer for MemoryTokenIssuer {
    async fn assume_role(
        &self,
        _role: &RoleDescriptor,
        session_name: &SessionName,
        cancel: &CancellationToken,
    ) -> Result<TemporaryCredentials, CollaboratorError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;

        let cancel_mid_call = {
            let mut state = self.state.lock().expect("issuer state lock poisoned");
            std::mem::take(&mut state.cancel_caller_mid_call)
        };
        if cancel_mid_call {
            cancel.cancel();
            tokio::task::yield_now().await;
            return Err(CollaboratorError::new(
                CollaboratorKind::TokenIssuer,
                "caller disconnected during role assumption",
            ));
        }

        let mut state = self.state.lock().expect("issuer state lock poisoned");
        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }

        if state.issue_unusable {
            return Ok(TemporaryCredentials {
                access_key_id: String::new(),
                secret_access_key: String::new(),
                session_token: String::new(),
                expires_at: Utc::now() + ChronoDuration::hours(1),
            });
        }

        Ok(TemporaryCredentials {
            access_key_id: format!("AKIAMEM{:05}", count),
            secret_access_key: format!("memory-secret-{}", count),
            session_token: format!("memory-token-{}-{}", count, session_name),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        })
    }
}

// ============================================================================
// Memory Queue
// ============================================================================

/// One accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: String,
    pub payload: String,
}

#[derive(Debug, Default)]
struct QueueState {
    sends: Vec<SentMessage>,
    attempts: usize,
    scripted_failures: VecDeque<CollaboratorError>,
    send_delay: Option<Duration>,
}

/// Shared backing store for every client a [`MemoryClientFactory`] builds.
///
/// Holding the store directly lets tests inspect and script sends no
/// matter which client instance performed them.
#[derive(Debug)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
        })
    }

    /// Queue a failure for the next send.
    pub fn fail_next(&self, error: CollaboratorError) {
        self.state
            .lock()
            .expect("queue state lock poisoned")
            .scripted_failures
            .push_back(error);
    }

    /// Delay every send by the given duration before it resolves.
    pub fn set_send_delay(&self, delay: Duration) {
        self.state
            .lock()
            .expect("queue state lock poisoned")
            .send_delay = Some(delay);
    }

    /// Number of accepted sends.
    pub fn send_count(&self) -> usize {
        self.state.lock().expect("queue state lock poisoned").sends.len()
    }

    /// Number of send attempts, including scripted failures.
    pub fn attempt_count(&self) -> usize {
        self.state.lock().expect("queue state lock poisoned").attempts
    }

    /// Copy of every accepted send, in order.
    pub fn sends(&self) -> Vec<SentMessage> {
        self.state
            .lock()
            .expect("queue state lock poisoned")
            .sends
            .clone()
    }

    async fn send(&self, destination: &str, payload: &str) -> Result<SendReceipt, CollaboratorError> {
        let (failure, delay) = {
            let mut state = self.state.lock().expect("queue state lock poisoned");
            state.attempts += 1;
            (state.scripted_failures.pop_front(), state.send_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = failure {
            return Err(error);
        }

        let checksum = Sha256::digest(payload.as_bytes())
            .iter()
            .fold(String::new(), |mut acc, byte| {
                acc.push_str(&format!("{:02x}", byte));
                acc
            });

        let receipt = SendReceipt {
            message_id: MessageId::new(Uuid::new_v4().to_string()),
            checksum,
        };

        self.state
            .lock()
            .expect("queue state lock poisoned")
            .sends
            .push(SentMessage {
                destination: destination.to_string(),
                payload: payload.to_string(),
            });

        Ok(receipt)
    }
}

// ============================================================================
// Memory Queue Client & Factory
// ============================================================================

/// Queue client writing into a shared [`MemoryQueue`].
#[derive(Debug)]
pub struct MemoryQueueClient {
    queue: Arc<MemoryQueue>,
}

impl MemoryQueueClient {
    /// Create a client bound to the given queue.
    pub fn new(queue: Arc<MemoryQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl QueueClient for MemoryQueueClient {
    async fn send(
        &self,
        destination: &str,
        payload: &str,
        _cancel: &CancellationToken,
    ) -> Result<SendReceipt, CollaboratorError> {
        self.queue.send(destination, payload).await
    }
}

/// Factory producing a fresh [`MemoryQueueClient`] per build, all backed by
/// one shared [`MemoryQueue`].
pub struct MemoryClientFactory {
    queue: Arc<MemoryQueue>,
    build_count: AtomicU32,
}

impl MemoryClientFactory {
    /// Create a factory with its own backing queue.
    pub fn new() -> Self {
        Self::with_queue(MemoryQueue::new())
    }

    /// Create a factory writing into an existing queue.
    pub fn with_queue(queue: Arc<MemoryQueue>) -> Self {
        Self {
            queue,
            build_count: AtomicU32::new(0),
        }
    }

    /// The shared backing queue, for inspection and scripting.
    pub fn queue(&self) -> Arc<MemoryQueue> {
        Arc::clone(&self.queue)
    }

    /// Number of clients built so far.
    pub fn build_count(&self) -> u32 {
        self.build_count.load(Ordering::SeqCst)
    }
}

impl Default for MemoryClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientFactory for MemoryClientFactory {
    async fn build_client(
        &self,
        _credentials: &TemporaryCredentials,
        _region: &str,
    ) -> Result<Arc<dyn QueueClient>, CollaboratorError> {
        self.build_count.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryQueueClient::new(Arc::clone(&self.queue))))
    }
}

/// Convenience constructor for a transient issuer failure.
pub fn transient_issuer_error(message: &str) -> CollaboratorError {
    CollaboratorError::new(CollaboratorKind::TokenIssuer, message).with_status(503)
}

/// Convenience constructor for a non-transient queue failure.
pub fn denied_queue_error(message: &str) -> CollaboratorError {
    CollaboratorError::new(CollaboratorKind::QueueClient, message).with_status(403)
}
