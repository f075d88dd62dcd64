use cookit_core::{events::EventHeader, impl_event};
use uuid::Uuid;

use crate::workers::events::RunContext;

#[derive(serde::Serialize)]
pub struct VideoRequested {
    pub header: EventHeader,
    pub ctx: RunContext,
}

impl VideoRequested {
    pub const EVENT_TYPE: &'static str = "video.requested";

    pub fn new(run_id: Uuid, ctx: RunContext) -> Self {
        Self {
            header: EventHeader::root(run_id),
            ctx,
        }
    }
}

impl_event!(VideoRequested);
