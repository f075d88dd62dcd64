use std::path::PathBuf;

use cookit_core::{
    CombinedTranscript,
    events::{Event, EventHeader},
    impl_event,
};

use crate::workers::events::RunContext;

#[derive(serde::Serialize)]
pub struct TranscriptCombined {
    pub header: EventHeader,
    pub ctx: RunContext,
    pub video_path: Option<PathBuf>,
    pub text_sources: Vec<&'static str>,
    pub combined: CombinedTranscript,
}

impl TranscriptCombined {
    pub const EVENT_TYPE: &'static str = "transcript.combined";

    pub fn new(
        parent: &dyn Event,
        ctx: RunContext,
        video_path: Option<PathBuf>,
        text_sources: Vec<&'static str>,
        combined: CombinedTranscript,
    ) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            ctx,
            video_path,
            text_sources,
            combined,
        }
    }
}

impl_event!(TranscriptCombined);
