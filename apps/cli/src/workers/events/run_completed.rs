use cookit_core::{
    Recipe,
    events::{Event, EventHeader},
    impl_event,
};

#[derive(Clone, serde::Serialize)]
pub struct RunCompleted {
    pub header: EventHeader,
    pub video_id: String,
    pub recipe: Recipe,
    /// `None` when uploading was skipped.
    pub recipe_id: Option<String>,
    pub warnings: Vec<String>,
}

impl RunCompleted {
    pub const EVENT_TYPE: &'static str = "run.completed";

    pub fn new(
        parent: &dyn Event,
        video_id: String,
        recipe: Recipe,
        recipe_id: Option<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            video_id,
            recipe,
            recipe_id,
            warnings,
        }
    }
}

impl_event!(RunCompleted);
