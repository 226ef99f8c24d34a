//! Broker client abstraction
//!
//! A [`Broker`] is scoped to one source subscription and one destination
//! topic. It exposes exactly the three operations a relocation needs:
//! pull one message, publish one message, acknowledge one message.
//!
//! Two implementations live here:
//! - [`pubsub::PubSubBroker`]: Cloud Pub/Sub over its REST API.
//! - [`engine::MemoryBroker`]: an in-process pull broker with ack deadlines
//!   and redelivery, used for tests and local runs.

pub mod engine;
pub mod message;
pub mod pubsub;
pub mod resource;
pub mod topic;

use std::time::Duration;

use async_trait::async_trait;

pub use engine::MemoryBroker;
pub use message::{AckId, Message, PublishToken};
pub use pubsub::PubSubBroker;
pub use resource::ResourceName;

use crate::utils::error::BrokerError;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Request at most one message from the source subscription.
    ///
    /// `Ok(None)` means nothing arrived before `timeout` elapsed: the source
    /// is drained. Any other failure is returned as-is and never retried here.
    async fn pull(&self, timeout: Duration) -> Result<Option<Message>, BrokerError>;

    /// Publish payload and attributes (never the ack id) to the destination
    /// topic, returning once the broker confirms the write.
    async fn publish(&self, message: &Message) -> Result<PublishToken, BrokerError>;

    /// Acknowledge a message on the source subscription.
    async fn acknowledge(&self, ack_id: &AckId) -> Result<(), BrokerError>;

    /// Release connections. Safe to call more than once.
    async fn close(&self);
}
