//! Exchange, queue and dead-letter declarations for the contacts command flow.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::error::MessagingResult;
use crate::traits::BrokerChannel;

/// Exchange every command is published to.
pub const EXCHANGE_NAME: &str = "contacts-exchange";
/// Queue the consumers read from.
pub const QUEUE_NAME: &str = "contacts-queue";
/// Queue collecting rejected commands.
pub const DEAD_LETTER_QUEUE_NAME: &str = "contacts-dlq";
/// Routing key used for every method.
pub const ROUTING_KEY: &str = "create";

/// Queue argument naming the exchange rejected messages are republished to.
pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
/// Queue argument naming the routing key rejected messages are republished with.
pub const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";

/// Exchange types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeType {
    /// Routes on exact routing key match
    Direct,
    /// Routes to every bound queue
    Fanout,
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeType::Direct => write!(f, "direct"),
            ExchangeType::Fanout => write!(f, "fanout"),
        }
    }
}

/// Exchange declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Exchange name
    pub name: String,
    /// Exchange type
    pub exchange_type: ExchangeType,
    /// Survives broker restart
    pub durable: bool,
    /// Deleted when the last queue unbinds
    pub auto_delete: bool,
}

impl ExchangeConfig {
    /// Create a durable exchange declaration
    pub fn new(name: &str, exchange_type: ExchangeType) -> Self {
        Self {
            name: name.to_string(),
            exchange_type,
            durable: true,
            auto_delete: false,
        }
    }
}

/// Queue declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue name
    pub name: String,
    /// Survives broker restart
    pub durable: bool,
    /// Restricted to the declaring connection
    pub exclusive: bool,
    /// Deleted when the last consumer unsubscribes
    pub auto_delete: bool,
    /// Extra declaration arguments (`x-*`)
    pub arguments: BTreeMap<String, String>,
}

impl QueueConfig {
    /// Create a durable, shared queue declaration
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            durable: true,
            exclusive: false,
            auto_delete: false,
            arguments: BTreeMap::new(),
        }
    }

    /// Dead-letter rejected messages through `exchange` with `routing_key`.
    pub fn dead_letter(mut self, exchange: &str, routing_key: &str) -> Self {
        self.arguments
            .insert(DEAD_LETTER_EXCHANGE_ARG.to_string(), exchange.to_string());
        self.arguments
            .insert(DEAD_LETTER_ROUTING_KEY_ARG.to_string(), routing_key.to_string());
        self
    }

    /// Dead-letter target as `(exchange, routing_key)`, if configured
    pub fn dead_letter_target(&self) -> Option<(&str, Option<&str>)> {
        self.arguments.get(DEAD_LETTER_EXCHANGE_ARG).map(|exchange| {
            (
                exchange.as_str(),
                self.arguments
                    .get(DEAD_LETTER_ROUTING_KEY_ARG)
                    .map(String::as_str),
            )
        })
    }
}

/// Declaration plan for an exchange, its primary queue and a dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Exchange commands are published to
    pub exchange: ExchangeConfig,
    /// Queue bound to the exchange
    pub queue: QueueConfig,
    /// Queue receiving rejected messages
    pub dead_letter_queue: QueueConfig,
    /// Binding key between exchange and queue
    pub routing_key: String,
}

impl Topology {
    /// The fixed contacts topology.
    ///
    /// The primary queue dead-letters through the default exchange, which
    /// routes by queue name straight into the dead-letter queue.
    pub fn contacts() -> Self {
        Self {
            exchange: ExchangeConfig::new(EXCHANGE_NAME, ExchangeType::Direct),
            queue: QueueConfig::new(QUEUE_NAME).dead_letter("", DEAD_LETTER_QUEUE_NAME),
            dead_letter_queue: QueueConfig::new(DEAD_LETTER_QUEUE_NAME),
            routing_key: ROUTING_KEY.to_string(),
        }
    }

    /// Declare every resource of the plan.
    ///
    /// The dead-letter queue is declared before the primary queue so that no
    /// message can be rejected into a missing queue. A conflicting existing
    /// resource fails with [`MessagingError::TopologyConflict`](crate::MessagingError::TopologyConflict).
    pub async fn declare(&self, channel: &dyn BrokerChannel) -> MessagingResult<()> {
        channel.declare_queue(&self.dead_letter_queue).await?;
        debug!(queue = %self.dead_letter_queue.name, "Dead-letter queue declared");

        channel.declare_exchange(&self.exchange).await?;
        debug!(exchange = %self.exchange.name, "Exchange declared");

        channel.declare_queue(&self.queue).await?;
        debug!(queue = %self.queue.name, "Queue declared");

        channel
            .bind_queue(&self.queue.name, &self.exchange.name, &self.routing_key)
            .await?;

        info!(
            exchange = %self.exchange.name,
            queue = %self.queue.name,
            dead_letter_queue = %self.dead_letter_queue.name,
            routing_key = %self.routing_key,
            "Topology declared"
        );
        Ok(())
    }
}

/// Declare the contacts topology on the given channel.
pub async fn ensure_topology(channel: &dyn BrokerChannel) -> MessagingResult<()> {
    Topology::contacts().declare(channel).await
}
