//! Delivery types and publish/consume options.

use std::fmt;

/// Content type stamped on every published envelope.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Builder for creating publish options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Exchange name, `None` for the default exchange
    pub exchange: Option<String>,
    /// Routing key
    pub routing_key: String,
    /// Whether the message should survive a broker restart
    pub persistent: bool,
    /// Whether to wait for the broker's publisher confirm
    pub confirm: bool,
    /// Content type
    pub content_type: String,
}

impl PublishOptions {
    /// Create new publish options with routing key.
    pub fn new(routing_key: &str) -> Self {
        Self {
            exchange: None,
            routing_key: routing_key.to_string(),
            persistent: true,
            confirm: false,
            content_type: JSON_CONTENT_TYPE.to_string(),
        }
    }

    /// Set the exchange.
    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange = Some(exchange.to_string());
        self
    }

    /// Set as non-persistent.
    pub fn transient(mut self) -> Self {
        self.persistent = false;
        self
    }

    /// Wait for the broker's confirm before returning.
    pub fn confirmed(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }
}

/// Options for consuming messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Queue name
    pub queue: String,
    /// Consumer tag
    pub consumer_tag: Option<String>,
    /// Number of unacknowledged deliveries the broker may hand out; 0 is unbounded
    pub prefetch: u16,
}

impl ConsumeOptions {
    /// Create new consume options.
    pub fn new(queue: &str) -> Self {
        Self {
            queue: queue.to_string(),
            consumer_tag: None,
            prefetch: 1,
        }
    }

    /// Set consumer tag.
    pub fn tag(mut self, tag: &str) -> Self {
        self.consumer_tag = Some(tag.to_string());
        self
    }

    /// Set prefetch count.
    pub fn prefetch(mut self, count: u16) -> Self {
        self.prefetch = count;
        self
    }
}

/// A message handed to a consumer, awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Delivery tag for acknowledgment
    pub delivery_tag: u64,
    /// Raw message body
    pub body: Vec<u8>,
    /// Exchange the message was published to
    pub exchange: String,
    /// Routing key used on publish
    pub routing_key: String,
    /// Whether the message was delivered before
    pub redelivered: bool,
}

impl Delivery {
    /// Get the body as a string.
    pub fn body_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Delivery {{ tag: {}, routing_key: {}, size: {} bytes }}",
            self.delivery_tag,
            self.routing_key,
            self.body.len()
        )
    }
}

/// What the consumer tells the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message from the queue
    Ack,
    /// Reject without requeue, sending the message to the dead-letter queue
    Reject,
}
