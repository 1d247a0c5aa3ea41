//! RabbitMQ broker connection and channels

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind, options::*,
    types::{AMQPValue, FieldTable},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MessagingConfig;
use crate::error::MessagingError;
use crate::message::{ConsumeOptions, Delivery, PublishOptions};
use crate::topology::{ExchangeConfig, ExchangeType, QueueConfig};
use crate::traits::{BrokerChannel, BrokerConnection, DeliveryStream};

/// Connection to a RabbitMQ server
pub struct RabbitMqConnection {
    connection: Arc<Connection>,
    publisher_confirms: bool,
    connected: AtomicBool,
}

impl RabbitMqConnection {
    /// Connect to RabbitMQ, giving up after the configured timeout
    pub async fn connect(config: &MessagingConfig) -> Result<Self, MessagingError> {
        info!(url = %redact(&config.url), "Connecting to RabbitMQ");

        let mut properties = ConnectionProperties::default();
        if let Some(name) = &config.connection_name {
            properties = properties.with_connection_name(name.clone().into());
        }

        let connecting = Connection::connect(&config.url, properties);
        let connection = tokio::time::timeout(config.connection_timeout, connecting)
            .await
            .map_err(|_| {
                MessagingError::Connection(format!(
                    "timed out after {:?} connecting to RabbitMQ",
                    config.connection_timeout
                ))
            })??;

        info!("Connected to RabbitMQ successfully");

        Ok(Self {
            connection: Arc::new(connection),
            publisher_confirms: config.publisher_confirms,
            connected: AtomicBool::new(true),
        })
    }

    /// Open a channel, enabling publisher confirms when configured
    pub async fn open_channel(&self) -> Result<RabbitMqChannel, MessagingError> {
        let channel = self.connection.create_channel().await?;
        if self.publisher_confirms {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await?;
        }
        debug!(channel_id = channel.id(), "Channel opened");
        Ok(RabbitMqChannel {
            channel,
            confirms: self.publisher_confirms,
        })
    }
}

#[async_trait]
impl BrokerConnection for RabbitMqConnection {
    async fn channel(&self) -> Result<Box<dyn BrokerChannel>, MessagingError> {
        Ok(Box::new(self.open_channel().await?))
    }

    async fn is_healthy(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.connection.status().connected()
    }

    async fn close(&self) -> Result<(), MessagingError> {
        info!("Closing RabbitMQ connection");
        self.connected.store(false, Ordering::SeqCst);
        self.connection
            .close(200, "Normal shutdown")
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))
    }
}

/// A RabbitMQ channel
pub struct RabbitMqChannel {
    channel: Channel,
    confirms: bool,
}

impl RabbitMqChannel {
    fn queue_arguments(config: &QueueConfig) -> FieldTable {
        let mut arguments = FieldTable::default();
        for (key, value) in &config.arguments {
            arguments.insert(
                key.clone().into(),
                AMQPValue::LongString(value.clone().into()),
            );
        }
        arguments
    }

    fn exchange_kind(exchange_type: ExchangeType) -> ExchangeKind {
        match exchange_type {
            ExchangeType::Direct => ExchangeKind::Direct,
            ExchangeType::Fanout => ExchangeKind::Fanout,
        }
    }

    fn properties(options: &PublishOptions) -> BasicProperties {
        let mut props = BasicProperties::default()
            .with_message_id(Uuid::new_v4().to_string().into())
            .with_content_type(options.content_type.clone().into());
        if options.persistent {
            props = props.with_delivery_mode(2);
        }
        props
    }
}

#[async_trait]
impl BrokerChannel for RabbitMqChannel {
    async fn declare_queue(&self, config: &QueueConfig) -> Result<(), MessagingError> {
        self.channel
            .queue_declare(
                &config.name,
                QueueDeclareOptions {
                    durable: config.durable,
                    exclusive: config.exclusive,
                    auto_delete: config.auto_delete,
                    ..Default::default()
                },
                Self::queue_arguments(config),
            )
            .await?;
        debug!(queue = %config.name, "Queue declared");
        Ok(())
    }

    async fn declare_exchange(&self, config: &ExchangeConfig) -> Result<(), MessagingError> {
        self.channel
            .exchange_declare(
                &config.name,
                Self::exchange_kind(config.exchange_type),
                ExchangeDeclareOptions {
                    durable: config.durable,
                    auto_delete: config.auto_delete,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        debug!(exchange = %config.name, "Exchange declared");
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), MessagingError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        debug!(queue, exchange, routing_key, "Queue bound to exchange");
        Ok(())
    }

    async fn publish_bytes(
        &self,
        options: &PublishOptions,
        body: &[u8],
    ) -> Result<(), MessagingError> {
        let exchange = options.exchange.as_deref().unwrap_or("");

        let confirm = self
            .channel
            .basic_publish(
                exchange,
                &options.routing_key,
                BasicPublishOptions::default(),
                body,
                Self::properties(options),
            )
            .await?;

        if self.confirms && options.confirm {
            let confirmation = confirm.await.map_err(|e| {
                error!(error = %e, "Publisher confirm failed");
                MessagingError::Publish(format!("Publisher confirm failed: {}", e))
            })?;
            if confirmation.is_nack() {
                return Err(MessagingError::Publish(
                    "broker negatively acknowledged the message".to_string(),
                ));
            }
        }

        debug!(exchange, routing_key = %options.routing_key, bytes = body.len(), "Message published");
        Ok(())
    }

    async fn consume(&self, options: ConsumeOptions) -> Result<DeliveryStream, MessagingError> {
        if options.prefetch > 0 {
            self.channel
                .basic_qos(options.prefetch, BasicQosOptions::default())
                .await?;
        }

        let consumer_tag = options
            .consumer_tag
            .unwrap_or_else(|| format!("contacts-{}", Uuid::new_v4()));

        let consumer = self
            .channel
            .basic_consume(
                &options.queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::Subscribe(e.to_string()))?;

        info!(queue = %options.queue, consumer_tag = %consumer_tag, "Consumer registered");

        let deliveries = consumer.map(|item| {
            item.map(|delivery| Delivery {
                delivery_tag: delivery.delivery_tag,
                body: delivery.data,
                exchange: delivery.exchange.to_string(),
                routing_key: delivery.routing_key.to_string(),
                redelivered: delivery.redelivered,
            })
            .map_err(MessagingError::from)
        });
        Ok(Box::pin(deliveries))
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| MessagingError::Acknowledge(e.to_string()))
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|e| MessagingError::Acknowledge(e.to_string()))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        if let Err(e) = self.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "Error closing channel");
        }
        Ok(())
    }
}

/// Strip credentials from a broker URL before logging it
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
