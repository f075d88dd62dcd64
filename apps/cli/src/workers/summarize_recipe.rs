use std::sync::Arc;

use cookit_core::{
    Summarizer,
    events::{EnrichedEvent, EventBus, expect},
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tokio::fs;

use crate::workers::events::{PromptBuilt, RecipeSummarized};

pub struct SummarizeRecipeWorker {
    summarizer: Arc<Summarizer>,
}

impl SummarizeRecipeWorker {
    pub fn new(summarizer: Arc<Summarizer>) -> Self {
        Self { summarizer }
    }
}

#[async_trait::async_trait]
impl Worker for SummarizeRecipeWorker {
    const SUBSCRIBER_ID: &'static str = "summarize.recipe";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::isolated(PromptBuilt::EVENT_TYPE, 4)],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<PromptBuilt>(&event.event, PromptBuilt::EVENT_TYPE)?;
        let artifacts = &req.ctx.artifacts;

        let summary = self
            .summarizer
            .summarize(
                &req.prompt,
                req.video_path.as_deref(),
                artifacts,
                req.ctx.job.resume,
            )
            .await?;
        let _ = fs::remove_file(artifacts.prompt_path()).await;

        bus.publish(Arc::new(RecipeSummarized::new(
            event.event.as_ref(),
            req.ctx.clone(),
            summary,
            req.text_sources.clone(),
            req.combined_text_length,
        )));
        Ok(())
    }
}
