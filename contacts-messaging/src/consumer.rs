//! Queue consumer loop.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::MessagingResult;
use crate::message::{ConsumeOptions, Delivery, Disposition};
use crate::topology::QUEUE_NAME;
use crate::traits::BrokerChannel;

/// Counters kept by a running consumer.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    received: AtomicU64,
    applied: AtomicU64,
    ignored: AtomicU64,
    routing_failures: AtomicU64,
    domain_failures: AtomicU64,
    rejected: AtomicU64,
    ack_failures: AtomicU64,
}

/// Point-in-time copy of [`ConsumerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub applied: u64,
    pub ignored: u64,
    pub routing_failures: u64,
    pub domain_failures: u64,
    pub rejected: u64,
    pub ack_failures: u64,
}

impl ConsumerStats {
    fn record(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Applied(_) => &self.applied,
            DispatchOutcome::Ignored(_) => &self.ignored,
            DispatchOutcome::RoutingFailed(_) => &self.routing_failures,
            DispatchOutcome::DomainFailed(_) => &self.domain_failures,
            DispatchOutcome::Malformed(_) => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            routing_failures: self.routing_failures.load(Ordering::Relaxed),
            domain_failures: self.domain_failures.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
        }
    }
}

/// Reads commands off the contacts queue and settles each delivery
/// according to its [`DispatchOutcome`].
///
/// Deliveries are handled one at a time; run several workers on separate
/// channels for parallelism.
pub struct ConsumerWorker {
    channel: Arc<dyn BrokerChannel>,
    dispatcher: Dispatcher,
    options: ConsumeOptions,
    stats: Arc<ConsumerStats>,
}

impl ConsumerWorker {
    /// Create a worker on `contacts-queue` with a prefetch of one
    pub fn new(channel: Arc<dyn BrokerChannel>, dispatcher: Dispatcher) -> Self {
        Self {
            channel,
            dispatcher,
            options: ConsumeOptions::new(QUEUE_NAME),
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Override the subscription options
    pub fn with_options(mut self, options: ConsumeOptions) -> Self {
        self.options = options;
        self
    }

    /// Shared handle to this worker's counters
    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    /// Consume until `shutdown` resolves or the delivery stream ends.
    ///
    /// A delivery being handled when shutdown fires is settled first.
    /// Returns an error if the subscription cannot be set up or the stream
    /// reports a broker failure.
    pub async fn run<F>(&self, shutdown: F) -> MessagingResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut deliveries = self.channel.consume(self.options.clone()).await?;
        info!(queue = %self.options.queue, prefetch = self.options.prefetch, "Consumer started");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping consumer");
                    break;
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        self.handle(delivery).await;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Consumer stream failed");
                        return Err(e);
                    }
                    None => {
                        debug!("Consumer stream ended");
                        break;
                    }
                },
            }
        }

        let stats = self.stats.snapshot();
        info!(
            received = stats.received,
            applied = stats.applied,
            rejected = stats.rejected,
            "Consumer stopped"
        );
        Ok(())
    }

    /// Dispatch one delivery and settle it
    pub async fn handle(&self, delivery: Delivery) -> DispatchOutcome {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        debug!(delivery = %delivery, redelivered = delivery.redelivered, "Received delivery");

        let outcome = self.dispatcher.dispatch(&delivery.body).await;
        self.stats.record(&outcome);

        let settled = match outcome.disposition() {
            Disposition::Ack => self.channel.ack(delivery.delivery_tag).await,
            Disposition::Reject => self.channel.reject(delivery.delivery_tag, false).await,
        };
        if let Err(e) = settled {
            self.stats.ack_failures.fetch_add(1, Ordering::Relaxed);
            warn!(delivery_tag = delivery.delivery_tag, error = %e, "Failed to settle delivery");
        }

        outcome
    }
}
