use std::{sync::Arc, time::Duration};

use cmq_client::MessageQueue;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::publisher::{Event, EventPublisher};

/// What a single poll cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The queue had nothing to deliver
    Empty,
    /// Receive failed; any message stays in the queue
    ReceiveFailed,
    /// Publish failed; the message was not deleted and will be redelivered
    PublishFailed,
    /// The message was published, `acknowledged` tells whether the delete went through
    Delivered {
        /// Whether the message was deleted from the queue
        acknowledged: bool,
    },
}

/// Counts kept over the lifetime of a [`Poller`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerSummary {
    /// Poll cycles run
    pub cycles: u64,
    /// Messages published downstream
    pub delivered: u64,
    /// Published messages whose delete failed
    pub unacknowledged: u64,
    /// Cycles that ended with a receive or publish error
    pub failed: u64,
}

impl PollerSummary {
    fn record(&mut self, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Empty => {}
            CycleOutcome::ReceiveFailed | CycleOutcome::PublishFailed => self.failed += 1,
            CycleOutcome::Delivered { acknowledged } => {
                self.delivered += 1;
                if !acknowledged {
                    self.unacknowledged += 1;
                }
            }
        }
    }
}

/// Timer driven receive, publish, delete loop
///
/// One cycle runs at a time. Shutdown is only observed between cycles, so a
/// cycle that has started always runs to completion.
pub struct Poller {
    queue: Arc<dyn MessageQueue>,
    publisher: Arc<dyn EventPublisher>,
    beat_name: String,
    period: Duration,
    counter: u64,
    shutdown: CancellationToken,
}

impl Poller {
    /// Creates a new `Poller`
    #[must_use]
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        publisher: Arc<dyn EventPublisher>,
        beat_name: String,
        period: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            publisher,
            beat_name,
            period,
            counter: 1,
            shutdown,
        }
    }

    /// Runs the poll loop until the shutdown token is cancelled
    pub async fn run(mut self) -> PollerSummary {
        info!(
            queue = self.queue.queue_name(),
            period_ms = u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX),
            "Poller started"
        );

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = PollerSummary::default();

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!("Poller received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let outcome = self.poll_once().await;
            summary.record(outcome);
        }

        info!(
            cycles = summary.cycles,
            delivered = summary.delivered,
            unacknowledged = summary.unacknowledged,
            failed = summary.failed,
            "Poller stopped"
        );
        summary
    }

    /// Runs one receive, publish, delete cycle
    #[instrument(skip(self), fields(queue = %self.queue.queue_name()))]
    pub async fn poll_once(&mut self) -> CycleOutcome {
        let message = match self.queue.receive().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("No messages received");
                return CycleOutcome::Empty;
            }
            Err(e) => {
                error!(error = %e, "Failed to receive message");
                return CycleOutcome::ReceiveFailed;
            }
        };

        let counter = self.counter;
        self.counter += 1;

        let event = Event::new(&self.beat_name, counter, message.body);
        if let Err(e) = self.publisher.publish(event).await {
            error!(
                counter,
                msg_id = message.msg_id.as_deref().unwrap_or_default(),
                error = ?e,
                "Failed to publish event, leaving message in queue"
            );
            return CycleOutcome::PublishFailed;
        }

        let acknowledged = match self.queue.delete(&message.receipt_handle).await {
            Ok(()) => true,
            Err(e) => {
                error!(counter, error = %e, "Failed to delete message");
                false
            }
        };

        info!(
            counter,
            msg_id = message.msg_id.as_deref().unwrap_or_default(),
            acknowledged,
            "Event sent"
        );
        CycleOutcome::Delivered { acknowledged }
    }
}
