//! Collaborator implementations.
//!
//! - [`aws`]: production providers backed by AWS STS and SQS
//! - [`memory`]: scriptable in-memory providers for testing and development

pub mod aws;
pub mod memory;

pub use aws::{SqsClientFactory, SqsQueueClient, StsTokenIssuer};
pub use memory::{MemoryClientFactory, MemoryQueue, MemoryQueueClient, MemoryTokenIssuer};
