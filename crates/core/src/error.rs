use std::path::PathBuf;
use thiserror::Error;

use crate::{parser::ParseError, provider::ProviderError, store::StoreError};

#[derive(Error, Debug)]
pub enum CookitError {
    #[error("Missing configuration: {key} is not set")]
    MissingConfig { key: String },

    #[error("Invalid video URL: {url}")]
    InvalidUrl { url: String },

    #[error("No usable source for video {video_id}: {reason}")]
    SourceUnavailable { video_id: String, reason: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Audio extraction failed for {video_path}: {reason}")]
    AudioExtractionFailed { video_path: PathBuf, reason: String },

    #[error("Frame extraction failed for {video_path}: {reason}")]
    FrameExtractionFailed { video_path: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    TranscriptFailed { audio_path: PathBuf, reason: String },

    #[error("Model download failed from {url}: {reason}")]
    ModelDownloadFailed { url: String, reason: String },

    #[error("Generative model error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Unparseable model response ({source}), raw response kept at {}", raw_path.display())]
    UnparseableResponse {
        #[source]
        source: ParseError,
        raw_path: PathBuf,
    },

    #[error("Recipe persistence failed: {0}")]
    Persistence(#[source] StoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CookitError {
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }
}

pub type Result<T> = std::result::Result<T, CookitError>;
