//! Consumer process

use std::sync::Arc;

use contacts_config::RelayConfig;
use contacts_domain::{ContactOperations, InMemoryContacts};
use contacts_messaging::{
    ConsumeOptions, ConsumerWorker, Dispatcher, QUEUE_NAME, StatsSnapshot, ensure_topology,
};
use tracing::{info, warn};

use crate::error::CliResult;

/// Subscription options from configuration
pub fn consume_options(config: &RelayConfig) -> ConsumeOptions {
    let options = ConsumeOptions::new(QUEUE_NAME).prefetch(config.consumer.prefetch);
    match &config.consumer.consumer_tag {
        Some(tag) => options.tag(tag),
        None => options,
    }
}

/// Declare the topology and consume until Ctrl-C.
///
/// Contacts are applied to an in-process store; it is dropped on exit.
pub async fn run(config: &RelayConfig) -> CliResult<StatsSnapshot> {
    let session = super::connect(config).await?;

    let setup = session.channel().await?;
    ensure_topology(setup.as_ref()).await?;

    let store: Arc<dyn ContactOperations> = Arc::new(InMemoryContacts::new());
    let worker = ConsumerWorker::new(session.channel().await?, Dispatcher::new(store))
        .with_options(consume_options(config));
    let stats = worker.stats();

    let result = worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    let closed = session.shutdown().await;
    result?;
    closed?;

    let snapshot = stats.snapshot();
    info!(
        received = snapshot.received,
        applied = snapshot.applied,
        ignored = snapshot.ignored,
        routing_failures = snapshot.routing_failures,
        domain_failures = snapshot.domain_failures,
        rejected = snapshot.rejected,
        ack_failures = snapshot.ack_failures,
        "Consumer finished"
    );
    Ok(snapshot)
}
