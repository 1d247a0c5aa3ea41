//! # Contacts Messaging
//!
//! Asynchronous command transport for contact CRUD operations over a message
//! broker.
//!
//! Producers publish [`Envelope`]s (`method`, `route`, `message`) to the
//! `contacts-exchange`; consumers read them from `contacts-queue`, route them
//! to a [`ContactOperations`](contacts_domain::ContactOperations)
//! implementation and acknowledge each delivery. Bodies that cannot be decoded
//! are rejected into the `contacts-dlq` dead-letter queue.
//!
//! ## Features
//!
//! - `rabbitmq` - RabbitMQ/AMQP support via `lapin`
//!
//! Without features the crate still ships [`InMemoryBroker`], an in-process
//! broker with the same routing and acknowledgment behavior.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use contacts_domain::{ContactPayload, InMemoryContacts};
//! use contacts_messaging::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let broker = InMemoryBroker::new();
//! let session = BrokerSession::new(Arc::new(broker.clone()));
//!
//! let channel = session.channel().await?;
//! ensure_topology(channel.as_ref()).await?;
//!
//! let publisher = CommandPublisher::new(channel);
//! publisher
//!     .publish(
//!         Method::Create,
//!         "contacts",
//!         Some(ContactPayload::new("Ana", "11999999999", "a@b.com", "011")),
//!     )
//!     .await?;
//!
//! let store = Arc::new(InMemoryContacts::new());
//! let worker = ConsumerWorker::new(session.channel().await?, Dispatcher::new(store.clone()));
//! let stats = worker.stats();
//! worker
//!     .run(async move {
//!         while stats.snapshot().received == 0 {
//!             tokio::task::yield_now().await;
//!         }
//!     })
//!     .await?;
//!
//! assert_eq!(store.len().await, 1);
//! session.shutdown().await?;
//! # Ok::<(), MessagingError>(())
//! # }).unwrap();
//! ```

pub mod broker;
pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod route;
pub mod topology;
pub mod traits;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

pub use broker::BrokerSession;
pub use config::{DEFAULT_BROKER_URL, MessagingConfig};
pub use consumer::{ConsumerStats, ConsumerWorker, StatsSnapshot};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use envelope::{Envelope, Method, decode, encode};
pub use error::{MessagingError, MessagingResult};
pub use memory::{InMemoryBroker, InMemoryChannel};
pub use message::{ConsumeOptions, Delivery, Disposition, PublishOptions};
pub use publisher::CommandPublisher;
pub use route::{ResourceRoute, RouteTarget, parse_route};
pub use topology::{
    DEAD_LETTER_QUEUE_NAME, EXCHANGE_NAME, ExchangeConfig, ExchangeType, QUEUE_NAME, QueueConfig,
    ROUTING_KEY, Topology, ensure_topology,
};
pub use traits::{BrokerChannel, BrokerConnection, DeliveryStream};

#[cfg(feature = "rabbitmq")]
pub use rabbitmq::{RabbitMqChannel, RabbitMqConnection};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::broker::BrokerSession;
    pub use crate::config::MessagingConfig;
    pub use crate::consumer::{ConsumerStats, ConsumerWorker};
    pub use crate::dispatcher::{DispatchOutcome, Dispatcher};
    pub use crate::envelope::{Envelope, Method};
    pub use crate::error::{MessagingError, MessagingResult};
    pub use crate::memory::InMemoryBroker;
    pub use crate::publisher::CommandPublisher;
    pub use crate::topology::ensure_topology;
    pub use crate::traits::{BrokerChannel, BrokerConnection};

    #[cfg(feature = "rabbitmq")]
    pub use crate::rabbitmq::RabbitMqConnection;
}
