use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recipe::Recipe;

/// A video the pipeline was asked to process. Fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    pub video_id: String,
    pub url: String,
    pub title: Option<String>,
    pub channel: Option<String>,
}

/// Text recognized on one sampled frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameText {
    pub index: usize,
    pub timestamp: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Everything the extraction stage managed to pull out of a video.
///
/// Every text source is optional. The run only gives up when there is
/// neither a video file nor captions to work from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedSources {
    pub video_path: Option<PathBuf>,
    pub ocr_text: Option<String>,
    pub caption_text: Option<String>,
    pub speech_text: Option<String>,
}

impl ExtractedSources {
    pub fn has_any_text(&self) -> bool {
        [&self.ocr_text, &self.caption_text, &self.speech_text]
            .iter()
            .any(|t| t.as_deref().is_some_and(|t| !t.trim().is_empty()))
    }

    pub fn is_usable(&self) -> bool {
        self.video_path.is_some() || self.caption_text.is_some()
    }

    pub fn text_sources(&self) -> Vec<&'static str> {
        let mut sources = Vec::new();
        if self.ocr_text.is_some() {
            sources.push("ocr");
        }
        if self.caption_text.is_some() {
            sources.push("captions");
        }
        if self.speech_text.is_some() {
            sources.push("speech");
        }
        sources
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub video_url: String,
    pub video_id: Option<String>,
    pub status: RunStatus,
    pub recipe_id: Option<String>,
    pub error: Option<String>,
    pub failed_stage: Option<String>,
    pub elapsed: Duration,
    pub recipe: Option<Recipe>,
    /// Degraded steps that did not fail the run.
    pub warnings: Vec<String>,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
