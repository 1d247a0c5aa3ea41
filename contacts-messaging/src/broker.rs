//! Process-wide broker session.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::MessagingResult;
use crate::traits::{BrokerChannel, BrokerConnection};

/// Owns the broker connection for the lifetime of the process and tracks
/// every channel handed out, so shutdown can close them before the
/// connection itself.
///
/// Created once at startup and passed to whoever needs a channel.
#[derive(Clone)]
pub struct BrokerSession {
    connection: Arc<dyn BrokerConnection>,
    channels: Arc<Mutex<Vec<Arc<dyn BrokerChannel>>>>,
}

impl BrokerSession {
    /// Wrap an established connection
    pub fn new(connection: Arc<dyn BrokerConnection>) -> Self {
        Self {
            connection,
            channels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connect to RabbitMQ
    #[cfg(feature = "rabbitmq")]
    pub async fn connect(config: &crate::config::MessagingConfig) -> MessagingResult<Self> {
        let connection = crate::rabbitmq::RabbitMqConnection::connect(config).await?;
        Ok(Self::new(Arc::new(connection)))
    }

    /// Whether the underlying connection is usable
    pub async fn is_healthy(&self) -> bool {
        self.connection.is_healthy().await
    }

    /// Open a new channel owned by this session
    pub async fn channel(&self) -> MessagingResult<Arc<dyn BrokerChannel>> {
        let channel: Arc<dyn BrokerChannel> = Arc::from(self.connection.channel().await?);
        let mut channels = self.channels.lock().await;
        channels.push(channel.clone());
        debug!(open_channels = channels.len(), "Session channel opened");
        Ok(channel)
    }

    /// Close every channel, newest first, then the connection.
    ///
    /// Channel close failures are logged and do not stop the shutdown.
    pub async fn shutdown(&self) -> MessagingResult<()> {
        let channels: Vec<_> = self.channels.lock().await.drain(..).collect();
        info!(channels = channels.len(), "Shutting down broker session");

        for channel in channels.iter().rev() {
            if let Err(e) = channel.close().await {
                warn!(error = %e, "Error closing channel");
            }
        }

        self.connection.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;
    use crate::message::{ConsumeOptions, PublishOptions};
    use crate::topology::QueueConfig;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_shutdown_closes_channels_and_connection() {
        let broker = InMemoryBroker::new();
        let session = BrokerSession::new(Arc::new(broker.clone()));
        assert!(session.is_healthy().await);

        let channel = session.channel().await.unwrap();
        channel.declare_queue(&QueueConfig::new("jobs")).await.unwrap();
        let mut stream = channel.consume(ConsumeOptions::new("jobs")).await.unwrap();

        session.shutdown().await.unwrap();

        assert!(stream.next().await.is_none());
        assert!(!session.is_healthy().await);
        assert!(
            channel
                .publish_bytes(&PublishOptions::new("jobs"), b"late")
                .await
                .is_err()
        );
    }
}
