use std::sync::Arc;

use cookit_core::{
    combine,
    events::{EnrichedEvent, EventBus, expect},
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tokio::fs;
use tracing::debug;

use crate::workers::events::{SourcesExtracted, TranscriptCombined};

pub struct CombineTextWorker;

#[async_trait::async_trait]
impl Worker for CombineTextWorker {
    const SUBSCRIBER_ID: &'static str = "combine.text";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::isolated(SourcesExtracted::EVENT_TYPE, 4)],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<SourcesExtracted>(&event.event, SourcesExtracted::EVENT_TYPE)?;
        let sources = &req.sources;

        let combined = combine(
            sources.ocr_text.as_deref(),
            sources.caption_text.as_deref(),
            sources.speech_text.as_deref(),
        );
        debug!(present = combined.present_count(), "text sources combined");

        fs::write(req.ctx.artifacts.combined_text_path(), combined.render()).await?;

        bus.publish(Arc::new(TranscriptCombined::new(
            event.event.as_ref(),
            req.ctx.clone(),
            sources.video_path.clone(),
            sources.text_sources(),
            combined,
        )));
        Ok(())
    }
}
