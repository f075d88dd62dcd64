use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{Instrument, debug, error, info_span};

use crate::{
    events::{EnrichedEvent, EventBus},
    workers::{StageFailed, SubscriptionSpec, WorkerInputs},
};

/// A pipeline stage: consumes the events it subscribed to and publishes the
/// next ones. A failed `handle` becomes a [`StageFailed`] for that run.
#[async_trait]
pub trait Worker: Send + Sized + 'static {
    const SUBSCRIBER_ID: &'static str;

    fn subscription() -> SubscriptionSpec;

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> Result<()>;

    async fn run(
        mut self,
        mut inputs: WorkerInputs,
        bus: Arc<EventBus>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(stage = Self::SUBSCRIBER_ID, "worker stopped");
                    return Ok(());
                }
                item = inputs.next() => {
                    let cause = Arc::clone(&item.event.event);
                    let span = info_span!(
                        "stage",
                        stage = Self::SUBSCRIBER_ID,
                        run_id = %cause.run_id(),
                        event_type = item.event_type,
                    );

                    let outcome = self.handle(item.event, &bus).instrument(span).await;
                    if let Err(e) = outcome {
                        error!(stage = Self::SUBSCRIBER_ID, run_id = %cause.run_id(), "{e:#}");
                        bus.publish(Arc::new(StageFailed::new(
                            cause.as_ref(),
                            Self::SUBSCRIBER_ID,
                            format!("{e:#}"),
                        )));
                    }
                }
            }
        }
    }
}
