use cookit_core::{
    ExtractedSources,
    events::{Event, EventHeader},
    impl_event,
};

use crate::workers::events::RunContext;

#[derive(serde::Serialize)]
pub struct SourcesExtracted {
    pub header: EventHeader,
    pub ctx: RunContext,
    pub sources: ExtractedSources,
}

impl SourcesExtracted {
    pub const EVENT_TYPE: &'static str = "sources.extracted";

    pub fn new(parent: &dyn Event, ctx: RunContext, sources: ExtractedSources) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            ctx,
            sources,
        }
    }
}

impl_event!(SourcesExtracted);
