//! Topology declaration command

use contacts_config::RelayConfig;
use contacts_messaging::{Topology, ensure_topology};
use tracing::error;

use crate::error::CliResult;

/// Declare the exchange, queue and dead-letter queue, then disconnect.
pub async fn run(config: &RelayConfig) -> CliResult<Topology> {
    let session = super::connect(config).await?;
    let channel = session.channel().await?;

    let declared = ensure_topology(channel.as_ref()).await;
    if let Err(e) = &declared {
        error!(error = %e, "Topology declaration failed");
    }

    session.shutdown().await?;
    declared?;
    Ok(Topology::contacts())
}
