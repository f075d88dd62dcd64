use std::path::PathBuf;

use cookit_core::{
    PromptDocument,
    events::{Event, EventHeader},
    impl_event,
};

use crate::workers::events::RunContext;

#[derive(serde::Serialize)]
pub struct PromptBuilt {
    pub header: EventHeader,
    pub ctx: RunContext,
    pub video_path: Option<PathBuf>,
    pub text_sources: Vec<&'static str>,
    pub combined_text_length: usize,
    pub prompt: PromptDocument,
}

impl PromptBuilt {
    pub const EVENT_TYPE: &'static str = "prompt.built";

    pub fn new(
        parent: &dyn Event,
        ctx: RunContext,
        video_path: Option<PathBuf>,
        text_sources: Vec<&'static str>,
        combined_text_length: usize,
        prompt: PromptDocument,
    ) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            ctx,
            video_path,
            text_sources,
            combined_text_length,
            prompt,
        }
    }
}

impl_event!(PromptBuilt);
