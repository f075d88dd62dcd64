use std::sync::Arc;

use cookit_core::{
    SourceExtractor,
    events::{EnrichedEvent, EventBus, expect},
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tracing::warn;

use crate::workers::events::{SourcesExtracted, VideoRequested};

pub struct ExtractSourcesWorker {
    extractor: Arc<SourceExtractor>,
}

impl ExtractSourcesWorker {
    pub fn new(extractor: Arc<SourceExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait::async_trait]
impl Worker for ExtractSourcesWorker {
    const SUBSCRIBER_ID: &'static str = "extract.sources";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec::isolated(VideoRequested::EVENT_TYPE, 4)],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<VideoRequested>(&event.event, VideoRequested::EVENT_TYPE)?;
        let mut ctx = req.ctx.clone();

        if ctx.source.title.is_none() {
            match self.extractor.source().fetch_title(&ctx.source).await {
                Ok(title) => ctx.source.title = title,
                Err(e) => {
                    warn!(video_id = %ctx.source.video_id, error = %e, "title lookup failed")
                }
            }
        }

        let sources = self
            .extractor
            .extract(&ctx.source, &ctx.artifacts, ctx.job.resume)
            .await?;

        bus.publish(Arc::new(SourcesExtracted::new(
            event.event.as_ref(),
            ctx,
            sources,
        )));
        Ok(())
    }
}
