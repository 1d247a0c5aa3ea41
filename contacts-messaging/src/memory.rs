//! In-process broker with AMQP-like routing semantics.
//!
//! Supports direct and fanout exchanges, the default exchange (routes by
//! queue name), manual acknowledgment with prefetch, dead-lettering through
//! `x-dead-letter-*` queue arguments on reject, and redelivery of unacked
//! messages when their channel closes. Used by the test suites and for
//! running the consumer without a RabbitMQ server.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{MessagingError, MessagingResult};
use crate::message::{ConsumeOptions, Delivery, PublishOptions};
use crate::topology::{ExchangeConfig, ExchangeType, QueueConfig};
use crate::traits::{BrokerChannel, BrokerConnection, DeliveryStream};

type DeliverySender = mpsc::UnboundedSender<Result<Delivery, MessagingError>>;

/// Shared in-process broker. Clones refer to the same broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<BrokerState>,
    disconnected: AtomicBool,
    next_channel_id: AtomicU64,
    /// Bumped by a connection close; channels from older generations are dead.
    generation: AtomicU64,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeConfig>,
    queues: HashMap<String, QueueState>,
    bindings: BTreeSet<Binding>,
    unacked: HashMap<u64, Unacked>,
    next_delivery_tag: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Binding {
    exchange: String,
    queue: String,
    routing_key: String,
}

struct QueueState {
    config: QueueConfig,
    ready: VecDeque<StoredMessage>,
    consumers: Vec<ConsumerSlot>,
    next_consumer: usize,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    body: Vec<u8>,
    exchange: String,
    routing_key: String,
    redelivered: bool,
}

struct ConsumerSlot {
    channel_id: u64,
    tag: String,
    prefetch: u16,
    in_flight: usize,
    sender: DeliverySender,
}

impl ConsumerSlot {
    fn has_capacity(&self) -> bool {
        self.prefetch == 0 || self.in_flight < usize::from(self.prefetch)
    }
}

struct Unacked {
    channel_id: u64,
    queue: String,
    consumer_tag: String,
    message: StoredMessage,
}

impl InMemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a broker outage: every later operation fails with
    /// [`MessagingError::Connection`] until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self) {
        self.inner.disconnected.store(true, Ordering::SeqCst);
    }

    /// End a simulated outage
    pub fn reconnect(&self) {
        self.inner.disconnected.store(false, Ordering::SeqCst);
    }

    /// Whether the broker is reachable
    pub fn is_connected(&self) -> bool {
        !self.inner.disconnected.load(Ordering::SeqCst)
    }

    /// Open a channel
    pub fn open_channel(&self) -> MessagingResult<InMemoryChannel> {
        self.ensure_connected()?;
        let id = self.inner.next_channel_id.fetch_add(1, Ordering::SeqCst);
        debug!(channel_id = id, "Channel opened");
        Ok(InMemoryChannel {
            broker: self.clone(),
            id,
            generation: self.inner.generation.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        })
    }

    /// Messages waiting in a queue, not counting unacknowledged deliveries
    pub async fn queue_depth(&self, queue: &str) -> usize {
        let state = self.inner.state.lock().await;
        state.queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Bodies of the messages waiting in a queue, oldest first
    pub async fn queued_bodies(&self, queue: &str) -> Vec<Vec<u8>> {
        let state = self.inner.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|q| q.ready.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Deliveries handed to consumers and not yet settled
    pub async fn unacked_count(&self) -> usize {
        self.inner.state.lock().await.unacked.len()
    }

    /// Bindings of an exchange as `(queue, routing_key)` pairs
    pub async fn bindings(&self, exchange: &str) -> Vec<(String, String)> {
        let state = self.inner.state.lock().await;
        state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange)
            .map(|b| (b.queue.clone(), b.routing_key.clone()))
            .collect()
    }

    /// Whether a queue has been declared
    pub async fn has_queue(&self, queue: &str) -> bool {
        self.inner.state.lock().await.queues.contains_key(queue)
    }

    /// Whether an exchange has been declared
    pub async fn has_exchange(&self, exchange: &str) -> bool {
        self.inner.state.lock().await.exchanges.contains_key(exchange)
    }

    fn ensure_connected(&self) -> MessagingResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MessagingError::Connection(
                "in-memory broker is disconnected".to_string(),
            ))
        }
    }
}

impl BrokerState {
    fn route(&mut self, exchange: &str, routing_key: &str, message: StoredMessage) -> MessagingResult<usize> {
        let targets: Vec<String> = if exchange.is_empty() {
            self.queues
                .contains_key(routing_key)
                .then(|| routing_key.to_string())
                .into_iter()
                .collect()
        } else {
            let config = self.exchanges.get(exchange).ok_or_else(|| {
                MessagingError::Broker(format!("no exchange '{}'", exchange))
            })?;
            let fanout = config.exchange_type == ExchangeType::Fanout;
            self.bindings
                .iter()
                .filter(|b| b.exchange == exchange && (fanout || b.routing_key == routing_key))
                .map(|b| b.queue.clone())
                .collect()
        };

        if targets.is_empty() {
            debug!(exchange, routing_key, "Message unroutable, dropped");
        }

        for queue in &targets {
            if let Some(state) = self.queues.get_mut(queue) {
                state.ready.push_back(message.clone());
            }
            self.pump(queue);
        }
        Ok(targets.len())
    }

    /// Hand ready messages to consumers with free prefetch capacity, round robin.
    fn pump(&mut self, queue_name: &str) {
        let Some(queue) = self.queues.get_mut(queue_name) else {
            return;
        };

        queue.consumers.retain(|c| !c.sender.is_closed());

        while !queue.ready.is_empty() && !queue.consumers.is_empty() {
            let count = queue.consumers.len();
            let Some(index) = (0..count)
                .map(|offset| (queue.next_consumer + offset) % count)
                .find(|&i| queue.consumers[i].has_capacity())
            else {
                break;
            };
            queue.next_consumer = (index + 1) % count;

            let Some(message) = queue.ready.pop_front() else {
                break;
            };
            self.next_delivery_tag += 1;
            let delivery_tag = self.next_delivery_tag;
            let consumer = &mut queue.consumers[index];

            let delivery = Delivery {
                delivery_tag,
                body: message.body.clone(),
                exchange: message.exchange.clone(),
                routing_key: message.routing_key.clone(),
                redelivered: message.redelivered,
            };

            if consumer.sender.send(Ok(delivery)).is_err() {
                queue.ready.push_front(message);
                queue.consumers.remove(index);
                queue.next_consumer = 0;
                continue;
            }

            consumer.in_flight += 1;
            self.unacked.insert(
                delivery_tag,
                Unacked {
                    channel_id: consumer.channel_id,
                    queue: queue_name.to_string(),
                    consumer_tag: consumer.tag.clone(),
                    message,
                },
            );
        }
    }

    fn settle(&mut self, channel_id: u64, delivery_tag: u64) -> MessagingResult<Unacked> {
        match self.unacked.get(&delivery_tag) {
            Some(unacked) if unacked.channel_id == channel_id => {}
            _ => {
                return Err(MessagingError::Acknowledge(format!(
                    "unknown delivery tag {} on channel {}",
                    delivery_tag, channel_id
                )));
            }
        }

        let Some(unacked) = self.unacked.remove(&delivery_tag) else {
            return Err(MessagingError::Acknowledge(format!(
                "unknown delivery tag {}",
                delivery_tag
            )));
        };
        if let Some(queue) = self.queues.get_mut(&unacked.queue)
            && let Some(consumer) = queue
                .consumers
                .iter_mut()
                .find(|c| c.channel_id == channel_id && c.tag == unacked.consumer_tag)
        {
            consumer.in_flight = consumer.in_flight.saturating_sub(1);
        }
        Ok(unacked)
    }

    fn requeue(&mut self, unacked: Unacked) {
        if let Some(queue) = self.queues.get_mut(&unacked.queue) {
            let mut message = unacked.message;
            message.redelivered = true;
            queue.ready.push_front(message);
        }
    }

    fn dead_letter(&mut self, unacked: Unacked) {
        let target = self
            .queues
            .get(&unacked.queue)
            .and_then(|q| q.config.dead_letter_target())
            .map(|(exchange, key)| (exchange.to_string(), key.map(str::to_string)));

        let Some((exchange, key)) = target else {
            debug!(queue = %unacked.queue, "Rejected message discarded, no dead-letter target");
            return;
        };

        let routing_key = key.unwrap_or_else(|| unacked.message.routing_key.clone());
        let message = StoredMessage {
            redelivered: false,
            ..unacked.message
        };
        match self.route(&exchange, &routing_key, message) {
            Ok(0) | Err(_) => {
                warn!(queue = %unacked.queue, exchange = %exchange, routing_key = %routing_key, "Dead-letter target unreachable, message dropped");
            }
            Ok(_) => {
                debug!(queue = %unacked.queue, routing_key = %routing_key, "Message dead-lettered");
            }
        }
    }

    fn close_channel(&mut self, channel_id: u64) {
        for queue in self.queues.values_mut() {
            queue.consumers.retain(|c| c.channel_id != channel_id);
            queue.next_consumer = 0;
        }

        let mut tags: Vec<u64> = self
            .unacked
            .iter()
            .filter(|(_, u)| u.channel_id == channel_id)
            .map(|(tag, _)| *tag)
            .collect();
        // Newest first so push_front restores the original order
        tags.sort_unstable_by(|a, b| b.cmp(a));

        let mut touched = HashSet::new();
        for tag in tags {
            if let Some(unacked) = self.unacked.remove(&tag) {
                touched.insert(unacked.queue.clone());
                self.requeue(unacked);
            }
        }
        for queue in touched {
            self.pump(&queue);
        }
    }
}

#[async_trait]
impl BrokerConnection for InMemoryBroker {
    async fn channel(&self) -> Result<Box<dyn BrokerChannel>, MessagingError> {
        Ok(Box::new(self.open_channel()?))
    }

    async fn is_healthy(&self) -> bool {
        self.is_connected()
    }

    async fn close(&self) -> Result<(), MessagingError> {
        let mut state = self.inner.state.lock().await;
        let channel_ids: HashSet<u64> = state
            .queues
            .values()
            .flat_map(|q| q.consumers.iter().map(|c| c.channel_id))
            .chain(state.unacked.values().map(|u| u.channel_id))
            .collect();
        for id in channel_ids {
            state.close_channel(id);
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        drop(state);

        self.disconnect();
        debug!("In-memory broker closed");
        Ok(())
    }
}

/// A channel on an [`InMemoryBroker`].
pub struct InMemoryChannel {
    broker: InMemoryBroker,
    id: u64,
    generation: u64,
    closed: AtomicBool,
}

impl InMemoryChannel {
    /// Channel number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the channel was closed, directly or with its connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
            || self.broker.inner.generation.load(Ordering::SeqCst) != self.generation
    }

    async fn state(&self) -> MessagingResult<MutexGuard<'_, BrokerState>> {
        self.broker.ensure_connected()?;
        if self.is_closed() {
            return Err(MessagingError::ChannelClosed(format!(
                "channel {} is closed",
                self.id
            )));
        }
        Ok(self.broker.inner.state.lock().await)
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn declare_queue(&self, config: &QueueConfig) -> Result<(), MessagingError> {
        let mut state = self.state().await?;
        match state.queues.get(&config.name) {
            Some(existing) if existing.config == *config => Ok(()),
            Some(_) => Err(MessagingError::TopologyConflict(format!(
                "queue '{}' already declared with different parameters",
                config.name
            ))),
            None => {
                state.queues.insert(
                    config.name.clone(),
                    QueueState {
                        config: config.clone(),
                        ready: VecDeque::new(),
                        consumers: Vec::new(),
                        next_consumer: 0,
                    },
                );
                Ok(())
            }
        }
    }

    async fn declare_exchange(&self, config: &ExchangeConfig) -> Result<(), MessagingError> {
        let mut state = self.state().await?;
        match state.exchanges.get(&config.name) {
            Some(existing) if existing == config => Ok(()),
            Some(_) => Err(MessagingError::TopologyConflict(format!(
                "exchange '{}' already declared with different parameters",
                config.name
            ))),
            None => {
                state.exchanges.insert(config.name.clone(), config.clone());
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), MessagingError> {
        let mut state = self.state().await?;
        if !state.queues.contains_key(queue) {
            return Err(MessagingError::Broker(format!("no queue '{}'", queue)));
        }
        if !state.exchanges.contains_key(exchange) {
            return Err(MessagingError::Broker(format!("no exchange '{}'", exchange)));
        }
        state.bindings.insert(Binding {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        });
        Ok(())
    }

    async fn publish_bytes(
        &self,
        options: &PublishOptions,
        body: &[u8],
    ) -> Result<(), MessagingError> {
        let mut state = self.state().await?;
        let exchange = options.exchange.as_deref().unwrap_or("");
        let message = StoredMessage {
            body: body.to_vec(),
            exchange: exchange.to_string(),
            routing_key: options.routing_key.clone(),
            redelivered: false,
        };
        state.route(exchange, &options.routing_key, message)?;
        Ok(())
    }

    async fn consume(&self, options: ConsumeOptions) -> Result<DeliveryStream, MessagingError> {
        let mut state = self.state().await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let queue = state.queues.get_mut(&options.queue).ok_or_else(|| {
            MessagingError::Subscribe(format!("no queue '{}'", options.queue))
        })?;
        let tag = options
            .consumer_tag
            .unwrap_or_else(|| format!("contacts-{}", Uuid::new_v4()));
        queue.consumers.push(ConsumerSlot {
            channel_id: self.id,
            tag: tag.clone(),
            prefetch: options.prefetch,
            in_flight: 0,
            sender,
        });
        state.pump(&options.queue);

        debug!(queue = %options.queue, consumer_tag = %tag, "Consumer registered");
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError> {
        let mut state = self.state().await?;
        let unacked = state.settle(self.id, delivery_tag)?;
        state.pump(&unacked.queue);
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError> {
        let mut state = self.state().await?;
        let unacked = state.settle(self.id, delivery_tag)?;
        let queue = unacked.queue.clone();
        if requeue {
            state.requeue(unacked);
        } else {
            state.dead_letter(unacked);
        }
        state.pump(&queue);
        Ok(())
    }

    async fn close(&self) -> Result<(), MessagingError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.broker.inner.state.lock().await;
        state.close_channel(self.id);
        debug!(channel_id = self.id, "Channel closed");
        Ok(())
    }
}
