//! CLI command implementations.

pub mod consume;
pub mod publish;
pub mod topology;

use contacts_config::RelayConfig;
use contacts_messaging::{BrokerSession, MessagingConfig};
use std::time::Duration;
use tracing::info;

use crate::error::CliResult;

/// Broker settings in the form the messaging crate expects
pub fn messaging_config(config: &RelayConfig) -> MessagingConfig {
    let messaging = MessagingConfig::new(config.broker.url.clone())
        .with_publisher_confirms(config.broker.publisher_confirms)
        .with_connection_timeout(Duration::from_secs(config.broker.connection_timeout_secs));
    match &config.broker.connection_name {
        Some(name) => messaging.with_connection_name(name.clone()),
        None => messaging,
    }
}

/// Open the process-wide broker session
pub async fn connect(config: &RelayConfig) -> CliResult<BrokerSession> {
    let session = BrokerSession::connect(&messaging_config(config)).await?;
    info!(healthy = session.is_healthy().await, "Broker session established");
    Ok(session)
}
