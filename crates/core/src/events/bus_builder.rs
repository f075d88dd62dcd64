use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::{
    events::{EnrichedEvent, EventBus},
    queues::{IsolatedForwarder, StartupTasks},
    routes::{Route, Routes},
    workers::{InboxInput, SubscriptionSpec, WorkerInputs, WorkerWiring},
};

pub struct BusConfig {
    pub session_id: Uuid,
    /// Panic on events nobody subscribed to. Meant for tests.
    pub strict_routing: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            strict_routing: false,
        }
    }
}

#[derive(Default)]
pub struct BusMetrics {
    pub unrouted_publish_total: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unrouted(&self, event_type: &'static str) {
        self.unrouted_publish_total.fetch_add(1, Ordering::Relaxed);
        debug!(event_type, "published event has no subscribers");
    }
}

fn validate(subs: &[SubscriptionSpec]) -> Result<()> {
    use std::collections::HashSet;

    let mut seen_subscribers: HashSet<&'static str> = HashSet::new();
    for s in subs {
        if s.subscriber_id.trim().is_empty() {
            anyhow::bail!("empty subscriber_id");
        }
        if !seen_subscribers.insert(s.subscriber_id) {
            anyhow::bail!("duplicate subscriber_id={}", s.subscriber_id);
        }
        if s.inputs.is_empty() {
            anyhow::bail!("subscriber_id={} has no inputs", s.subscriber_id);
        }

        let mut seen_inputs: HashSet<&'static str> = HashSet::new();
        for i in &s.inputs {
            if i.event_type.trim().is_empty() {
                anyhow::bail!("subscriber_id={} has empty event_type", s.subscriber_id);
            }
            if !seen_inputs.insert(i.event_type) {
                anyhow::bail!(
                    "subscriber_id={} has duplicate input event_type={}",
                    s.subscriber_id,
                    i.event_type
                );
            }

            anyhow::ensure!(
                i.output_buffer > 0,
                "subscriber_id={} output_buffer must be > 0",
                s.subscriber_id
            );
        }
    }
    Ok(())
}

pub struct EventBusBuilder {
    cfg: BusConfig,
    subs: Vec<SubscriptionSpec>,
}

impl EventBusBuilder {
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            subs: Vec::new(),
        }
    }

    pub fn subscribe(mut self, s: SubscriptionSpec) -> Self {
        self.subs.push(s);
        self
    }

    pub fn build(self) -> Result<(EventBus, WorkerWiring, StartupTasks)> {
        validate(&self.subs)?;

        let mut routes: HashMap<&'static str, Vec<Route>> = HashMap::new();
        let mut wiring: HashMap<&'static str, WorkerInputs> = HashMap::new();
        let mut tasks = StartupTasks { tokio: Vec::new() };
        let metrics = Arc::new(BusMetrics::new());

        for spec in self.subs {
            let notify_any = Arc::new(Notify::new());
            let mut inboxes = Vec::new();

            for input in spec.inputs {
                let (fwd, receiver, drain_task) = IsolatedForwarder::<Arc<EnrichedEvent>>::new(
                    input.output_buffer,
                    Arc::clone(&notify_any),
                );
                tasks.tokio.push(drain_task);

                routes.entry(input.event_type).or_default().push(Route {
                    subscriber_id: spec.subscriber_id,
                    inbox: fwd,
                    drops_total: Arc::new(AtomicU64::new(0)),
                });
                inboxes.push(InboxInput {
                    event_type: input.event_type,
                    receiver,
                });
            }

            wiring.insert(
                spec.subscriber_id,
                WorkerInputs {
                    inboxes,
                    notify_any,
                    next_index: 0,
                },
            );
        }

        let bus = EventBus::new(self.cfg, Routes { table: routes }, metrics);
        Ok((bus, WorkerWiring::new(wiring), tasks))
    }
}
