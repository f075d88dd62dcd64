use std::collections::HashMap;

use crate::workers::WorkerInputs;

pub struct SubscriptionSpec {
    pub subscriber_id: &'static str,
    pub inputs: Vec<InputSpec>,
}

impl SubscriptionSpec {
    /// Overrides the output buffer of every input.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        for input in &mut self.inputs {
            input.output_buffer = capacity;
        }
        self
    }
}

/// One event type a subscriber listens to. Delivery goes through an
/// unbounded inbox drained into a channel of `output_buffer` slots, so a
/// slow subscriber never loses events.
pub struct InputSpec {
    pub event_type: &'static str,
    pub output_buffer: usize,
}

impl InputSpec {
    pub fn isolated(event_type: &'static str, output_buffer: usize) -> Self {
        Self {
            event_type,
            output_buffer,
        }
    }
}

pub struct WorkerWiring {
    inputs: HashMap<&'static str, WorkerInputs>,
}

impl WorkerWiring {
    pub fn new(inputs: HashMap<&'static str, WorkerInputs>) -> Self {
        Self { inputs }
    }

    pub fn take(&mut self, subscriber_id: &'static str) -> Option<WorkerInputs> {
        self.inputs.remove(subscriber_id)
    }

    /// Like [`take`](Self::take), for subscribers registered with the builder.
    pub fn take_registered(
        &mut self,
        subscriber_id: &'static str,
    ) -> anyhow::Result<WorkerInputs> {
        self.take(subscriber_id)
            .ok_or_else(|| anyhow::anyhow!("subscriber_id={subscriber_id} is not wired"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_override_applies_to_every_input() {
        let spec = SubscriptionSpec {
            subscriber_id: "s",
            inputs: vec![InputSpec::isolated("a", 1), InputSpec::isolated("b", 4)],
        }
        .with_queue_capacity(32);

        assert!(spec.inputs.iter().all(|i| i.output_buffer == 32));
        assert_eq!(spec.inputs[1].event_type, "b");
    }
}
