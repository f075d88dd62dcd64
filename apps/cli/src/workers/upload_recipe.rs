use std::sync::Arc;

use chrono::Utc;
use cookit_core::{
    Uploader,
    events::{EnrichedEvent, EventBus, expect},
    store::AnalysisProvenance,
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tracing::info;

use crate::workers::events::{RecipeSummarized, RunCompleted};

/// Final stage. Without an uploader, or when the job opted out, the run
/// completes with the parsed recipe only.
pub struct UploadRecipeWorker {
    uploader: Option<Arc<Uploader>>,
}

impl UploadRecipeWorker {
    pub fn new(uploader: Option<Arc<Uploader>>) -> Self {
        Self { uploader }
    }
}

#[async_trait::async_trait]
impl Worker for UploadRecipeWorker {
    const SUBSCRIBER_ID: &'static str = "upload.recipe";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::isolated(RecipeSummarized::EVENT_TYPE, 4)],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<RecipeSummarized>(&event.event, RecipeSummarized::EVENT_TYPE)?;
        let video_id = req.ctx.source.video_id.clone();

        let uploader = match &self.uploader {
            Some(uploader) if req.ctx.job.upload => uploader,
            _ => {
                info!(%video_id, "upload skipped");
                bus.publish(Arc::new(RunCompleted::new(
                    event.event.as_ref(),
                    video_id,
                    req.recipe.clone(),
                    None,
                    Vec::new(),
                )));
                return Ok(());
            }
        };

        let provenance = AnalysisProvenance {
            model: req.model.clone(),
            processed_at: Utc::now(),
            processing_time_secs: req.processing_time_secs,
            parse_shape: serde_json::to_value(req.shape)?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            text_sources: req.text_sources.iter().map(|s| s.to_string()).collect(),
            combined_text_length: req.combined_text_length,
            confidence: None,
            raw_response: req.raw_response.clone(),
        };

        let outcome = uploader
            .upload(&req.recipe, &req.ctx.source, &req.ctx.artifacts, provenance)
            .await?;

        bus.publish(Arc::new(RunCompleted::new(
            event.event.as_ref(),
            video_id,
            req.recipe.clone(),
            Some(outcome.recipe_id),
            outcome.warnings,
        )));
        Ok(())
    }
}
