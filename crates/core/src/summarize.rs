//! Model call plus response parsing, with the raw response kept on disk.

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::fs;
use tracing::{info, warn};

use crate::{
    artifacts::{RunArtifacts, read_optional},
    error::{CookitError, Result},
    parser::{ParsedRecipe, parse_response},
    prompt::PromptDocument,
    provider::{GenerativeModel, VideoPayload},
};

#[derive(Debug, Clone)]
pub struct Summary {
    pub parsed: ParsedRecipe,
    pub raw_response: String,
    pub model: String,
    pub elapsed: Duration,
}

pub struct Summarizer {
    model: Arc<dyn GenerativeModel>,
    max_inline_video_bytes: u64,
}

impl Summarizer {
    pub fn new(model: Arc<dyn GenerativeModel>, max_inline_video_bytes: u64) -> Self {
        Self {
            model,
            max_inline_video_bytes,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Calls the model (or, with `reuse`, reads a response saved by an earlier
    /// attempt of this run) and parses the answer into a recipe.
    ///
    /// The raw response is written before parsing so an unparseable answer
    /// stays available at [`RunArtifacts::response_path`].
    pub async fn summarize(
        &self,
        prompt: &PromptDocument,
        video_path: Option<&Path>,
        run: &RunArtifacts,
        reuse: bool,
    ) -> Result<Summary> {
        let started = Instant::now();
        let raw_path = run.response_path();

        let saved = if reuse {
            read_optional(&raw_path).await?
        } else {
            None
        };
        let raw_response = match saved {
            Some(raw) => {
                info!(path = %raw_path.display(), "reusing saved model response");
                raw
            }
            None => {
                let payload = match video_path {
                    Some(path) => VideoPayload::load(path, self.max_inline_video_bytes).await,
                    None => None,
                };
                let raw = self.model.generate(prompt.as_str(), payload.as_ref()).await?;
                fs::write(&raw_path, &raw).await?;
                raw
            }
        };

        let parsed = match parse_response(&raw_response) {
            Ok(parsed) => parsed,
            Err(source) => {
                warn!(path = %raw_path.display(), "model response could not be parsed");
                return Err(CookitError::UnparseableResponse { source, raw_path });
            }
        };

        fs::write(
            run.recipe_path(),
            serde_json::to_string_pretty(&parsed.recipe)?,
        )
        .await?;

        let elapsed = started.elapsed();
        info!(
            model = self.model.model_name(),
            shape = ?parsed.shape,
            steps = parsed.recipe.instructions.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "recipe summarized"
        );

        Ok(Summary {
            parsed,
            raw_response,
            model: self.model.model_name().to_string(),
            elapsed,
        })
    }
}
