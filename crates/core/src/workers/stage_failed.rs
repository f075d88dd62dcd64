use serde::Serialize;

use crate::{
    events::{Event, EventHeader},
    impl_event,
};

/// Published by a worker whose handler failed. Terminal for the run.
#[derive(Clone, Debug, Serialize)]
pub struct StageFailed {
    pub header: EventHeader,
    pub stage: &'static str,
    pub message: String,
}

impl StageFailed {
    pub const EVENT_TYPE: &'static str = "stage.failed";

    pub fn new(cause: &dyn Event, stage: &'static str, message: String) -> Self {
        Self {
            header: EventHeader::child_of(cause),
            stage,
            message,
        }
    }
}

impl_event!(StageFailed);
