use std::sync::Arc;

use tokio::sync::{Notify, mpsc};

use crate::events::EnrichedEvent;

pub struct InboxInput {
    pub event_type: &'static str,
    pub receiver: mpsc::Receiver<Arc<EnrichedEvent>>,
}

pub struct WorkerInputs {
    pub inboxes: Vec<InboxInput>,
    pub notify_any: Arc<Notify>,
    pub next_index: usize,
}

pub struct WorkerItem {
    pub event_type: &'static str,
    pub event: Arc<EnrichedEvent>,
}

impl WorkerInputs {
    /// Next event across all inputs, visiting them round-robin so one busy
    /// event type cannot starve the others.
    pub async fn next(&mut self) -> WorkerItem {
        loop {
            if !self.inboxes.is_empty() {
                let start = self.next_index;

                loop {
                    let i = self.next_index;
                    self.next_index = (self.next_index + 1) % self.inboxes.len();
                    let inbox = &mut self.inboxes[i];

                    if let Ok(event) = inbox.receiver.try_recv() {
                        return WorkerItem {
                            event_type: inbox.event_type,
                            event,
                        };
                    }

                    if self.next_index == start {
                        break;
                    }
                }
            }
            self.notify_any.notified().await;
        }
    }
}
