use cookit_core::{
    ParseShape, Recipe, Summary,
    events::{Event, EventHeader},
    impl_event,
};

use crate::workers::events::RunContext;

#[derive(serde::Serialize)]
pub struct RecipeSummarized {
    pub header: EventHeader,
    pub ctx: RunContext,
    pub recipe: Recipe,
    pub shape: ParseShape,
    pub model: String,
    pub processing_time_secs: f64,
    pub text_sources: Vec<&'static str>,
    pub combined_text_length: usize,
    #[serde(skip)]
    pub raw_response: String,
}

impl RecipeSummarized {
    pub const EVENT_TYPE: &'static str = "recipe.summarized";

    pub fn new(
        parent: &dyn Event,
        ctx: RunContext,
        summary: Summary,
        text_sources: Vec<&'static str>,
        combined_text_length: usize,
    ) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            ctx,
            recipe: summary.parsed.recipe,
            shape: summary.parsed.shape,
            model: summary.model,
            processing_time_secs: summary.elapsed.as_secs_f64(),
            text_sources,
            combined_text_length,
            raw_response: summary.raw_response,
        }
    }
}

impl_event!(RecipeSummarized);
