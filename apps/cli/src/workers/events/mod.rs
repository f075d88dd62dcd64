pub mod prompt_built;
pub mod recipe_summarized;
pub mod run_completed;
pub mod sources_extracted;
pub mod transcript_combined;
pub mod video_requested;

pub use prompt_built::*;
pub use recipe_summarized::*;
pub use run_completed::*;
pub use sources_extracted::*;
pub use transcript_combined::*;
pub use video_requested::*;

use cookit_core::{RunArtifacts, VideoSource};

/// What the caller asked for.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct JobSpec {
    pub url: String,
    /// Reuse artifacts already present in the run directory.
    pub resume: bool,
    pub upload: bool,
}

/// Carried by every stage event of one run.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RunContext {
    pub job: JobSpec,
    pub source: VideoSource,
    pub artifacts: RunArtifacts,
}
