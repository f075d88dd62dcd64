use std::{path::PathBuf, sync::Arc, time::Instant};

use cookit_core::{
    PipelineConfig, ProviderClient, RunArtifacts, RunResult, RunStatus, SourceExtractor,
    Summarizer, SupabaseClient, ThumbnailFetcher, Uploader, VideoSourceProvider, YtDlp,
    events::{BusConfig, EventBus, EventBusBuilder},
    media::FfmpegFrameGrabber,
    ocr::TesseractCli,
    resolve_source,
    transcribe::{SpeechTranscriber, WhisperTranscriber, ensure_model},
    workers::{StageFailed, Worker},
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::workers::{
    build_prompt::BuildPromptWorker,
    combine_text::CombineTextWorker,
    completion_sink::{CompletionSinkWorker, PendingRuns},
    events::{JobSpec, RunCompleted, RunContext, VideoRequested},
    extract_sources::ExtractSourcesWorker,
    summarize_recipe::SummarizeRecipeWorker,
    upload_recipe::UploadRecipeWorker,
};

/// Stage name reported when the URL itself is rejected.
const RESOLVE_STAGE: &str = "resolve";

/// The collaborators the stage workers call into.
pub struct StageServices {
    pub extractor: Arc<SourceExtractor>,
    pub summarizer: Arc<Summarizer>,
    pub uploader: Option<Arc<Uploader>>,
}

impl StageServices {
    /// Production wiring: yt-dlp, tesseract, whisper, the configured model
    /// provider and, when `upload` is set, Supabase.
    pub async fn from_config(config: &PipelineConfig, upload: bool) -> anyhow::Result<Self> {
        let source: Arc<dyn VideoSourceProvider> =
            Arc::new(YtDlp::new("yt-dlp", config.speech_language.clone()));

        let transcriber: Option<Arc<dyn SpeechTranscriber>> =
            match ensure_model(&config.work_dir, &config.whisper_model).await {
                Ok(model_path) => Some(Arc::new(WhisperTranscriber::new(
                    model_path,
                    config.speech_language.clone(),
                ))),
                Err(e) => {
                    warn!(error = %e, "whisper model unavailable, speech text disabled");
                    None
                }
            };

        let extractor = SourceExtractor::new(
            source.clone(),
            Arc::new(TesseractCli::default()),
            transcriber,
            config.ocr.clone(),
        );

        let model = ProviderClient::new(
            config.provider.clone(),
            config.api_key.clone(),
            config.generation.clone(),
        )?;
        let summarizer = Summarizer::new(
            Arc::new(model),
            config.generation.max_inline_video_bytes,
        );

        let uploader = if upload {
            let client = Arc::new(SupabaseClient::from_config(config.require_supabase()?));
            let thumbnails = ThumbnailFetcher::new(
                config.upload.thumbnail_base_url.clone(),
                source,
                config.upload.default_thumbnail.clone(),
            );
            Some(Arc::new(
                Uploader::new(client.clone(), client, thumbnails, config.upload.clone())
                    .with_step_frames(Arc::new(FfmpegFrameGrabber)),
            ))
        } else {
            None
        };

        Ok(Self {
            extractor: Arc::new(extractor),
            summarizer: Arc::new(summarizer),
            uploader,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub work_dir: PathBuf,
    pub upload: bool,
    /// Keep the run directory after a successful run.
    pub keep_artifacts: bool,
    pub queue_capacity: usize,
}

impl PipelineOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            upload: true,
            keep_artifacts: false,
            queue_capacity: config.stage_queue_capacity,
        }
    }
}

pub struct Pipeline {
    bus: Arc<EventBus>,
    shutdown_tx: broadcast::Sender<()>,
    pending: PendingRuns,
    options: PipelineOptions,
}

impl Pipeline {
    /// Builds the bus and spawns one task per stage.
    pub fn start(
        services: StageServices,
        options: PipelineOptions,
        bus_config: BusConfig,
    ) -> anyhow::Result<Self> {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let pending = PendingRuns::default();
        let cap = options.queue_capacity;

        let builder = EventBusBuilder::new(bus_config)
            .subscribe(ExtractSourcesWorker::subscription().with_queue_capacity(cap))
            .subscribe(CombineTextWorker::subscription().with_queue_capacity(cap))
            .subscribe(BuildPromptWorker::subscription().with_queue_capacity(cap))
            .subscribe(SummarizeRecipeWorker::subscription().with_queue_capacity(cap))
            .subscribe(UploadRecipeWorker::subscription().with_queue_capacity(cap))
            .subscribe(CompletionSinkWorker::subscription().with_queue_capacity(cap));

        let (bus, mut wiring, tasks) = builder.build()?;
        let bus = Arc::new(bus);

        // isolated drain tasks must run before anything is published
        for t in tasks.tokio {
            tokio::spawn(t);
        }

        tokio::spawn(ExtractSourcesWorker::new(services.extractor).run(
            wiring.take_registered(ExtractSourcesWorker::SUBSCRIBER_ID)?,
            bus.clone(),
            shutdown_rx.resubscribe(),
        ));
        tokio::spawn(CombineTextWorker.run(
            wiring.take_registered(CombineTextWorker::SUBSCRIBER_ID)?,
            bus.clone(),
            shutdown_rx.resubscribe(),
        ));
        tokio::spawn(BuildPromptWorker.run(
            wiring.take_registered(BuildPromptWorker::SUBSCRIBER_ID)?,
            bus.clone(),
            shutdown_rx.resubscribe(),
        ));
        tokio::spawn(SummarizeRecipeWorker::new(services.summarizer).run(
            wiring.take_registered(SummarizeRecipeWorker::SUBSCRIBER_ID)?,
            bus.clone(),
            shutdown_rx.resubscribe(),
        ));
        tokio::spawn(UploadRecipeWorker::new(services.uploader).run(
            wiring.take_registered(UploadRecipeWorker::SUBSCRIBER_ID)?,
            bus.clone(),
            shutdown_rx.resubscribe(),
        ));
        tokio::spawn(CompletionSinkWorker::new(pending.clone()).run(
            wiring.take_registered(CompletionSinkWorker::SUBSCRIBER_ID)?,
            bus.clone(),
            shutdown_rx,
        ));

        info!(session_id = %bus.session_id(), "pipeline started");

        Ok(Self {
            bus,
            shutdown_tx,
            pending,
            options,
        })
    }

    /// Processes one video end to end.
    ///
    /// Without `resume` every run gets a fresh run id and starts from scratch.
    /// With it, stages reuse whatever that run already left on disk.
    pub async fn run(&self, url: &str, resume: Option<Uuid>) -> RunResult {
        let started = Instant::now();
        let run_id = resume.unwrap_or_else(Uuid::new_v4);
        let failed = |video_id: Option<String>, stage: &str, error: String| RunResult {
            run_id,
            video_url: url.to_string(),
            video_id,
            status: RunStatus::Failed,
            recipe_id: None,
            error: Some(error),
            failed_stage: Some(stage.to_string()),
            elapsed: started.elapsed(),
            recipe: None,
            warnings: Vec::new(),
        };

        let source = match resolve_source(url) {
            Ok(source) => source,
            Err(e) => return failed(None, RESOLVE_STAGE, e.to_string()),
        };
        let video_id = source.video_id.clone();

        let artifacts = RunArtifacts::new(&self.options.work_dir, &video_id, run_id);
        if resume.is_some() && !artifacts.root().exists() {
            return failed(
                Some(video_id),
                RESOLVE_STAGE,
                format!("nothing to resume at {}", artifacts.root().display()),
            );
        }

        info!(%run_id, %video_id, resume = resume.is_some(), "run started");

        let ctx = RunContext {
            job: JobSpec {
                url: source.url.clone(),
                resume: resume.is_some(),
                upload: self.options.upload,
            },
            source,
            artifacts: artifacts.clone(),
        };

        let done_rx = self.pending.register(run_id);
        self.bus.publish(Arc::new(VideoRequested::new(run_id, ctx)));

        let outcome = match done_rx.await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.pending.forget(run_id);
                return failed(
                    Some(video_id),
                    "pipeline",
                    "pipeline stopped before the run finished".into(),
                );
            }
        };

        match outcome {
            Ok(done) => self.completed(run_id, url, done, &artifacts, started).await,
            Err(StageFailed { stage, message, .. }) => {
                warn!(
                    %run_id,
                    stage,
                    path = %artifacts.root().display(),
                    "run failed, artifacts kept"
                );
                failed(Some(video_id), stage, message)
            }
        }
    }

    async fn completed(
        &self,
        run_id: Uuid,
        url: &str,
        done: RunCompleted,
        artifacts: &RunArtifacts,
        started: Instant,
    ) -> RunResult {
        let mut warnings = done.warnings;

        if !self.options.keep_artifacts
            && let Err(e) = artifacts.cleanup().await
        {
            warn!(%run_id, error = %e, "run directory not removed");
            warnings.push(format!("run directory not removed: {e}"));
        }

        let elapsed = started.elapsed();
        info!(
            %run_id,
            video_id = %done.video_id,
            recipe_id = ?done.recipe_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "run completed"
        );

        RunResult {
            run_id,
            video_url: url.to_string(),
            video_id: Some(done.video_id),
            status: RunStatus::Completed,
            recipe_id: done.recipe_id,
            error: None,
            failed_stage: None,
            elapsed,
            recipe: Some(done.recipe),
            warnings,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use cookit_core::{
        CookitError, GenerativeModel, OcrConfig, VideoSource,
        ocr::TextRecognizer,
        provider::{ProviderError, VideoPayload},
    };
    use tempfile::TempDir;
    use tokio::fs;

    use super::*;

    const VIDEO_URL: &str = "https://www.youtube.com/watch?v=abcdef12345&t=42s";

    struct CaptionsOnly;

    #[async_trait]
    impl VideoSourceProvider for CaptionsOnly {
        async fn download_video(
            &self,
            video: &VideoSource,
            _: &RunArtifacts,
        ) -> cookit_core::Result<PathBuf> {
            Err(CookitError::DownloadFailed {
                url: video.url.clone(),
                reason: "offline".into(),
            })
        }

        async fn download_captions(
            &self,
            _: &VideoSource,
            run: &RunArtifacts,
        ) -> cookit_core::Result<Option<PathBuf>> {
            let dir = run.captions_dir();
            fs::create_dir_all(&dir).await?;
            let path = dir.join("abcdef12345.ko.vtt");
            fs::write(
                &path,
                "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\n계란을 풀어주세요\n",
            )
            .await?;
            Ok(Some(path))
        }

        async fn fetch_title(&self, _: &VideoSource) -> cookit_core::Result<Option<String>> {
            Ok(Some("계란말이 만들기".into()))
        }

        async fn download_thumbnail(
            &self,
            video: &VideoSource,
            _: &Path,
        ) -> cookit_core::Result<PathBuf> {
            Err(CookitError::DownloadFailed {
                url: video.url.clone(),
                reason: "offline".into(),
            })
        }
    }

    struct Blind;

    #[async_trait]
    impl TextRecognizer for Blind {
        async fn recognize(&self, _: &Path, _: &str) -> cookit_core::Result<String> {
            Ok(String::new())
        }
    }

    struct Canned(Result<&'static str, u16>);

    #[async_trait]
    impl GenerativeModel for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn generate(
            &self,
            _: &str,
            _: Option<&VideoPayload>,
        ) -> Result<String, ProviderError> {
            match self.0 {
                Ok(reply) => Ok(reply.to_string()),
                Err(status) => Err(ProviderError::Api {
                    provider_name: "canned".into(),
                    status,
                    body: "quota exceeded".into(),
                }),
            }
        }
    }

    fn start(dir: &TempDir, model: Canned) -> Pipeline {
        let services = StageServices {
            extractor: Arc::new(SourceExtractor::new(
                Arc::new(CaptionsOnly),
                Arc::new(Blind),
                None,
                OcrConfig::default(),
            )),
            summarizer: Arc::new(Summarizer::new(Arc::new(model), 1024)),
            uploader: None,
        };
        let options = PipelineOptions {
            work_dir: dir.path().to_path_buf(),
            upload: false,
            keep_artifacts: false,
            queue_capacity: 4,
        };
        Pipeline::start(services, options, BusConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn run_completes_and_removes_its_directory() {
        let dir = TempDir::new().unwrap();
        let pipeline = start(
            &dir,
            Canned(Ok(r#"{"title": "계란말이", "steps": []}"#)),
        );

        let result = pipeline.run(VIDEO_URL, None).await;
        pipeline.shutdown();

        assert!(result.is_completed(), "{:?}", result.error);
        assert_eq!(result.video_id.as_deref(), Some("abcdef12345"));
        assert_eq!(result.recipe.unwrap().title, "계란말이");
        assert!(result.recipe_id.is_none());
        assert!(!dir.path().join("abcdef12345").join(result.run_id.to_string()).exists());
    }

    #[tokio::test]
    async fn model_failure_names_the_stage_and_keeps_artifacts() {
        let dir = TempDir::new().unwrap();
        let pipeline = start(&dir, Canned(Err(429)));

        let result = pipeline.run(VIDEO_URL, None).await;
        pipeline.shutdown();

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.failed_stage.as_deref(), Some("summarize.recipe"));
        let run = RunArtifacts::new(dir.path(), "abcdef12345", result.run_id);
        assert!(run.caption_text_path().exists());
        assert!(run.prompt_path().exists());
    }

    #[tokio::test]
    async fn invalid_url_fails_before_any_stage() {
        let dir = TempDir::new().unwrap();
        let pipeline = start(&dir, Canned(Ok("{}")));

        let result = pipeline.run("https://example.com/recipe", None).await;
        pipeline.shutdown();

        assert_eq!(result.failed_stage.as_deref(), Some("resolve"));
        assert!(result.video_id.is_none());
    }

    #[tokio::test]
    async fn resuming_an_unknown_run_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pipeline = start(&dir, Canned(Ok("{}")));

        let result = pipeline.run(VIDEO_URL, Some(Uuid::new_v4())).await;
        pipeline.shutdown();

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.unwrap().contains("nothing to resume"));
    }
}
