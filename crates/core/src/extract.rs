//! First stage: pulls every text source it can out of one video.
//!
//! Each source degrades on its own. A missing caption track, a failed frame
//! pass or a failed transcription leaves that source empty and the run goes
//! on. Only a video with neither a file nor captions is fatal.

use std::{path::Path, sync::Arc};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::{
    artifacts::{RunArtifacts, read_optional},
    config::OcrConfig,
    error::{CookitError, Result},
    format::{format_frame_texts, format_transcript_with_timestamps},
    media::{extract_audio, extract_frames},
    ocr::{TextRecognizer, list_frames, recognize_frames},
    source::VideoSourceProvider,
    subtitle::load_captions,
    transcribe::SpeechTranscriber,
    types::{ExtractedSources, VideoSource},
};

pub struct SourceExtractor {
    source: Arc<dyn VideoSourceProvider>,
    recognizer: Arc<dyn TextRecognizer>,
    transcriber: Option<Arc<dyn SpeechTranscriber>>,
    ocr: OcrConfig,
}

impl SourceExtractor {
    pub fn new(
        source: Arc<dyn VideoSourceProvider>,
        recognizer: Arc<dyn TextRecognizer>,
        transcriber: Option<Arc<dyn SpeechTranscriber>>,
        ocr: OcrConfig,
    ) -> Self {
        Self {
            source,
            recognizer,
            transcriber,
            ocr,
        }
    }

    pub fn source(&self) -> &Arc<dyn VideoSourceProvider> {
        &self.source
    }

    /// With `reuse`, artifacts already present in the run directory are read
    /// back instead of being produced again.
    pub async fn extract(
        &self,
        video: &VideoSource,
        run: &RunArtifacts,
        reuse: bool,
    ) -> Result<ExtractedSources> {
        run.ensure().await?;

        let video_path = match run.find_video().filter(|_| reuse) {
            Some(path) => Some(path),
            None => match self.source.download_video(video, run).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(video_id = %video.video_id, error = %e, "video unavailable");
                    None
                }
            },
        };

        let caption_text = self.captions(video, run, reuse).await;

        let (ocr_text, speech_text) = match &video_path {
            Some(path) => (
                self.frame_text(path, run, reuse).await,
                self.speech_text(path, run, reuse).await,
            ),
            None => (None, None),
        };

        let sources = ExtractedSources {
            video_path,
            ocr_text,
            caption_text,
            speech_text,
        };

        if !sources.is_usable() {
            return Err(CookitError::SourceUnavailable {
                video_id: video.video_id.clone(),
                reason: "no video file and no captions".into(),
            });
        }

        info!(
            video_id = %video.video_id,
            sources = ?sources.text_sources(),
            "sources extracted"
        );
        Ok(sources)
    }

    async fn captions(
        &self,
        video: &VideoSource,
        run: &RunArtifacts,
        reuse: bool,
    ) -> Option<String> {
        let out = run.caption_text_path();
        if let Some(text) = reused(&out, reuse).await {
            return Some(text);
        }

        let file = match run.find_caption_file().filter(|_| reuse) {
            Some(file) => Some(file),
            None => match self.source.download_captions(video, run).await {
                Ok(file) => file,
                Err(e) => {
                    warn!(video_id = %video.video_id, error = %e, "caption download failed");
                    None
                }
            },
        };
        let Some(file) = file else {
            info!(video_id = %video.video_id, "no captions for this video");
            return None;
        };

        match load_captions(&file).await {
            Ok(Some(text)) => persist(&out, text).await,
            Ok(None) => None,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "captions unreadable");
                None
            }
        }
    }

    async fn frame_text(
        &self,
        video_path: &Path,
        run: &RunArtifacts,
        reuse: bool,
    ) -> Option<String> {
        let out = run.ocr_text_path();
        if let Some(text) = reused(&out, reuse).await {
            return Some(text);
        }

        let frames_dir = run.frames_dir();
        let sampled = extract_frames(
            video_path,
            &frames_dir,
            self.ocr.interval_secs,
            self.ocr.crop_bottom,
        )
        .await
        .and_then(|_| list_frames(&frames_dir));

        let text = match sampled {
            Ok(frames) => {
                debug!(frames = frames.len(), "running text recognition");
                let recognized = recognize_frames(
                    self.recognizer.as_ref(),
                    &frames,
                    &self.ocr.language,
                    self.ocr.interval_secs,
                    self.ocr.concurrency,
                )
                .await;
                Some(format_frame_texts(&recognized)).filter(|t| !t.is_empty())
            }
            Err(e) => {
                warn!(error = %e, "frame sampling failed, continuing without on-screen text");
                None
            }
        };

        if let Err(e) = fs::remove_dir_all(&frames_dir).await {
            debug!(error = %e, "frames directory not removed");
        }

        match text {
            Some(text) => persist(&out, text).await,
            None => None,
        }
    }

    async fn speech_text(
        &self,
        video_path: &Path,
        run: &RunArtifacts,
        reuse: bool,
    ) -> Option<String> {
        let transcriber = self.transcriber.as_ref()?;
        let out = run.speech_text_path();
        if let Some(text) = reused(&out, reuse).await {
            return Some(text);
        }

        let audio_path = run.audio_path();
        let transcript = match extract_audio(video_path, &audio_path).await {
            Ok(()) => transcriber.transcribe(&audio_path).await,
            Err(e) => Err(e),
        };
        let _ = fs::remove_file(&audio_path).await;

        match transcript {
            Ok(transcript) => {
                let text = format_transcript_with_timestamps(&transcript);
                if text.trim().is_empty() {
                    return None;
                }
                persist(&out, text).await
            }
            Err(e) => {
                warn!(error = %e, "speech transcription failed, continuing without it");
                None
            }
        }
    }
}

async fn reused(path: &Path, reuse: bool) -> Option<String> {
    if !reuse {
        return None;
    }
    let text = read_optional(path).await.ok().flatten()?;
    debug!(path = %path.display(), "reusing artifact");
    Some(text)
}

/// Writes `text` for later stages and resumes. A write failure only loses the
/// file, the text itself is still returned.
async fn persist(path: &Path, text: String) -> Option<String> {
    if let Err(e) = fs::write(path, &text).await {
        warn!(path = %path.display(), error = %e, "could not write artifact");
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::types::Transcript;

    #[derive(Default)]
    struct FakeSource {
        captions: Option<&'static str>,
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl VideoSourceProvider for FakeSource {
        async fn download_video(&self, video: &VideoSource, _: &RunArtifacts) -> Result<PathBuf> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Err(CookitError::DownloadFailed {
                url: video.url.clone(),
                reason: "private video".into(),
            })
        }

        async fn download_captions(
            &self,
            _: &VideoSource,
            run: &RunArtifacts,
        ) -> Result<Option<PathBuf>> {
            let Some(raw) = self.captions else {
                return Ok(None);
            };
            let dir = run.captions_dir();
            fs::create_dir_all(&dir).await?;
            let path = dir.join("abc.ko.vtt");
            fs::write(&path, raw).await?;
            Ok(Some(path))
        }

        async fn fetch_title(&self, _: &VideoSource) -> Result<Option<String>> {
            Ok(None)
        }

        async fn download_thumbnail(&self, video: &VideoSource, _: &Path) -> Result<PathBuf> {
            Err(CookitError::DownloadFailed {
                url: video.url.clone(),
                reason: "unused".into(),
            })
        }
    }

    struct NoText;

    #[async_trait]
    impl TextRecognizer for NoText {
        async fn recognize(&self, _: &Path, _: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    struct Silent;

    #[async_trait]
    impl SpeechTranscriber for Silent {
        async fn transcribe(&self, _: &Path) -> Result<Transcript> {
            Ok(Transcript {
                text: String::new(),
                segments: vec![],
                language: "ko".into(),
            })
        }
    }

    fn video() -> VideoSource {
        VideoSource {
            video_id: "abc".into(),
            url: "https://www.youtube.com/watch?v=abc".into(),
            title: None,
            channel: None,
        }
    }

    fn extractor(source: FakeSource) -> SourceExtractor {
        SourceExtractor::new(
            Arc::new(source),
            Arc::new(NoText),
            Some(Arc::new(Silent)),
            OcrConfig::default(),
        )
    }

    #[tokio::test]
    async fn nothing_to_work_from_is_fatal() {
        let dir = TempDir::new().unwrap();
        let run = RunArtifacts::new(dir.path(), "abc", Uuid::new_v4());

        let err = extractor(FakeSource::default())
            .extract(&video(), &run, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CookitError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn captions_alone_are_enough() {
        let dir = TempDir::new().unwrap();
        let run = RunArtifacts::new(dir.path(), "abc", Uuid::new_v4());
        let source = FakeSource {
            captions: Some("WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n물을 끓입니다\n"),
            ..Default::default()
        };

        let sources = extractor(source).extract(&video(), &run, false).await.unwrap();

        assert!(sources.video_path.is_none());
        assert_eq!(sources.caption_text.as_deref(), Some("[00:00:01] 물을 끓입니다"));
        assert_eq!(sources.text_sources(), vec!["captions"]);
        assert_eq!(
            std::fs::read_to_string(run.caption_text_path()).unwrap(),
            "[00:00:01] 물을 끓입니다"
        );
    }

    #[tokio::test]
    async fn resume_reads_existing_artifacts() {
        let dir = TempDir::new().unwrap();
        let run = RunArtifacts::new(dir.path(), "abc", Uuid::new_v4());
        run.ensure().await.unwrap();
        std::fs::write(run.root().join("video.mp4"), b"mp4").unwrap();
        std::fs::write(run.ocr_text_path(), "[00:00:02] 양파").unwrap();
        std::fs::write(run.speech_text_path(), "[00:00:03] 썰어주세요").unwrap();

        let source = Arc::new(FakeSource::default());
        let extractor = SourceExtractor::new(
            source.clone(),
            Arc::new(NoText),
            Some(Arc::new(Silent)),
            OcrConfig::default(),
        );
        let sources = extractor.extract(&video(), &run, true).await.unwrap();

        assert_eq!(source.downloads.load(Ordering::SeqCst), 0);
        assert_eq!(sources.video_path, Some(run.root().join("video.mp4")));
        assert_eq!(sources.ocr_text.as_deref(), Some("[00:00:02] 양파"));
        assert_eq!(sources.speech_text.as_deref(), Some("[00:00:03] 썰어주세요"));
        assert!(sources.caption_text.is_none());
    }
}
