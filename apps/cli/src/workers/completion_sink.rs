use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use cookit_core::{
    events::{EnrichedEvent, EventBus, downcast_ref},
    workers::{InputSpec, StageFailed, SubscriptionSpec, Worker},
};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::workers::events::RunCompleted;

pub type RunOutcome = Result<RunCompleted, StageFailed>;

/// Callers waiting for a run to finish, keyed by run id.
#[derive(Clone, Default)]
pub struct PendingRuns {
    inner: Arc<Mutex<HashMap<Uuid, oneshot::Sender<RunOutcome>>>>,
}

impl PendingRuns {
    pub fn register(&self, run_id: Uuid) -> oneshot::Receiver<RunOutcome> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .lock()
            .expect("PendingRuns poisoned")
            .insert(run_id, tx);
        rx
    }

    pub fn forget(&self, run_id: Uuid) {
        self.inner.lock().expect("PendingRuns poisoned").remove(&run_id);
    }

    fn resolve(&self, run_id: Uuid, outcome: RunOutcome) {
        let waiter = self.inner.lock().expect("PendingRuns poisoned").remove(&run_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => debug!(%run_id, "outcome for a run nobody waits on"),
        }
    }
}

pub struct CompletionSinkWorker {
    pending: PendingRuns,
}

impl CompletionSinkWorker {
    pub fn new(pending: PendingRuns) -> Self {
        Self { pending }
    }
}

#[async_trait::async_trait]
impl Worker for CompletionSinkWorker {
    const SUBSCRIBER_ID: &'static str = "cli.completion_sink";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![
                InputSpec::isolated(RunCompleted::EVENT_TYPE, 4),
                InputSpec::isolated(StageFailed::EVENT_TYPE, 4),
            ],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        let run_id = event.event.run_id();

        if let Some(done) = downcast_ref::<RunCompleted>(&event.event) {
            self.pending.resolve(run_id, Ok(done.clone()));
        } else if let Some(failed) = downcast_ref::<StageFailed>(&event.event) {
            self.pending.resolve(run_id, Err(failed.clone()));
        }
        Ok(())
    }
}
