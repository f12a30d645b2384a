//! # Queue Courier
//!
//! Resilient, credential-refreshing send path for message queues backed by
//! short-lived assumed-role credentials.
//!
//! This library provides:
//! - A credential lease manager that caches one queue client and refreshes
//!   it before the underlying token expires
//! - A resilience pipeline layering an attempt timeout, a circuit breaker,
//!   and a single forced-refresh retry for credential-expiry failures
//! - A send-service façade with input validation and a health signal
//! - AWS (STS + SQS) and in-memory provider implementations
//!
//! ## Module Organization
//!
//! - [`error`] - Send error taxonomy and failure classification
//! - [`config`] - Role descriptor and tuning settings
//! - [`issuer`] / [`client`] - Collaborator traits and their data types
//! - [`lease`] - Credential lease manager
//! - [`breaker`] / [`pipeline`] - Resilience layers
//! - [`service`] - Public send-service façade
//! - [`providers`] - AWS and in-memory collaborator implementations
//! - [`clock`] - Injectable time source

// Module declarations
pub mod breaker;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod issuer;
pub mod lease;
pub mod pipeline;
pub mod providers;
pub mod service;

// Re-export commonly used types at crate root for convenience
pub use breaker::{BreakerPermit, CircuitBreaker, CircuitState};
pub use client::{ClientFactory, MessageId, QueueClient, SendReceipt};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerSettings, LeaseSettings, ResilienceSettings, RoleDescriptor};
pub use error::{CollaboratorError, CollaboratorKind, SendError};
pub use issuer::{SessionName, TemporaryCredentials, TokenIssuer};
pub use lease::CredentialLeaseManager;
pub use pipeline::ResiliencePipeline;
pub use service::QueueSendService;
