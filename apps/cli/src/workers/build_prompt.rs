use std::sync::Arc;

use cookit_core::{
    build_prompt,
    events::{EnrichedEvent, EventBus, expect},
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tokio::fs;

use crate::workers::events::{PromptBuilt, TranscriptCombined};

pub struct BuildPromptWorker;

#[async_trait::async_trait]
impl Worker for BuildPromptWorker {
    const SUBSCRIBER_ID: &'static str = "build.prompt";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::isolated(TranscriptCombined::EVENT_TYPE, 4)],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<TranscriptCombined>(&event.event, TranscriptCombined::EVENT_TYPE)?;
        let artifacts = &req.ctx.artifacts;

        let prompt = build_prompt(&req.ctx.source, &req.combined);
        fs::write(artifacts.prompt_path(), prompt.as_str()).await?;
        // the combined text now lives inside the prompt
        let _ = fs::remove_file(artifacts.combined_text_path()).await;

        bus.publish(Arc::new(PromptBuilt::new(
            event.event.as_ref(),
            req.ctx.clone(),
            req.video_path.clone(),
            req.text_sources.clone(),
            req.combined.render().chars().count(),
            prompt,
        )));
        Ok(())
    }
}
