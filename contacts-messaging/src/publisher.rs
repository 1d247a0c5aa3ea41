//! Command publisher.

use std::sync::Arc;

use contacts_domain::ContactPayload;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::envelope::{self, Envelope, Method};
use crate::error::MessagingResult;
use crate::message::PublishOptions;
use crate::topology::{EXCHANGE_NAME, ROUTING_KEY};
use crate::traits::BrokerChannel;

/// Publishes contact commands to the contacts exchange.
///
/// Holds one channel behind an async mutex; concurrent `publish` calls take
/// turns on it.
pub struct CommandPublisher {
    channel: Mutex<Arc<dyn BrokerChannel>>,
    confirm: bool,
}

impl CommandPublisher {
    /// Create a publisher waiting for broker confirms
    pub fn new(channel: Arc<dyn BrokerChannel>) -> Self {
        Self {
            channel: Mutex::new(channel),
            confirm: true,
        }
    }

    /// Set whether each publish waits for the broker confirm
    pub fn with_confirms(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    /// Publish a command.
    ///
    /// Returns once the broker has accepted the message (or, without
    /// confirms, once it has been written). Never waits for a consumer.
    pub async fn publish(
        &self,
        method: Method,
        route: &str,
        message: Option<ContactPayload>,
    ) -> MessagingResult<()> {
        self.publish_envelope(&Envelope::new(method, route, message))
            .await
    }

    /// Publish a prepared envelope
    pub async fn publish_envelope(&self, envelope: &Envelope) -> MessagingResult<()> {
        envelope.validate()?;
        let body = envelope::encode(envelope)?;

        let options = PublishOptions::new(ROUTING_KEY)
            .exchange(EXCHANGE_NAME)
            .confirmed(self.confirm);

        let channel = self.channel.lock().await;
        channel
            .publish_bytes(&options, &body)
            .await
            .map_err(|e| {
                error!(method = %envelope.method, route = %envelope.route, error = %e, "Publish failed");
                e.into_publish_error()
            })?;

        debug!(method = %envelope.method, route = %envelope.route, "Command published");
        Ok(())
    }
}
