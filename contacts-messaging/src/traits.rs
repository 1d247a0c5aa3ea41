//! Traits for message broker implementations.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::MessagingError;
use crate::message::{ConsumeOptions, Delivery, PublishOptions};
use crate::topology::{ExchangeConfig, QueueConfig};

/// A stream of deliveries from one consumer subscription.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, MessagingError>> + Send>>;

/// Trait for message broker connections.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Open a channel for publishing and consuming messages.
    async fn channel(&self) -> Result<Box<dyn BrokerChannel>, MessagingError>;

    /// Check if the connection is healthy.
    async fn is_healthy(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), MessagingError>;
}

/// Trait for message broker channels.
///
/// A channel must not be used by concurrent publishers without external
/// synchronization.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a queue. Identical redeclarations are no-ops.
    async fn declare_queue(&self, config: &QueueConfig) -> Result<(), MessagingError>;

    /// Declare an exchange. Identical redeclarations are no-ops.
    async fn declare_exchange(&self, config: &ExchangeConfig) -> Result<(), MessagingError>;

    /// Bind a queue to an exchange.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), MessagingError>;

    /// Publish raw bytes.
    async fn publish_bytes(
        &self,
        options: &PublishOptions,
        body: &[u8],
    ) -> Result<(), MessagingError>;

    /// Start consuming messages from a queue with manual acknowledgment.
    async fn consume(&self, options: ConsumeOptions) -> Result<DeliveryStream, MessagingError>;

    /// Acknowledge a delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError>;

    /// Reject a delivery.
    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError>;

    /// Close the channel.
    async fn close(&self) -> Result<(), MessagingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe
    fn _assert_object_safe(_: &dyn BrokerConnection, _: &dyn BrokerChannel) {}
}
