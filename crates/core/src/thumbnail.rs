//! Thumbnail retrieval with an ordered fallback chain.

use std::{path::PathBuf, sync::Arc};

use tokio::fs;
use tracing::{debug, warn};

use crate::{
    artifacts::RunArtifacts, error::Result, media::convert_to_jpeg, source::VideoSourceProvider,
    types::VideoSource,
};

const STILL_NAMES: [&str; 2] = ["maxresdefault.jpg", "hqdefault.jpg"];

pub struct ThumbnailFetcher {
    client: reqwest::Client,
    base_url: String,
    source: Arc<dyn VideoSourceProvider>,
    default_thumbnail: Option<PathBuf>,
}

impl ThumbnailFetcher {
    pub fn new(
        base_url: impl Into<String>,
        source: Arc<dyn VideoSourceProvider>,
        default_thumbnail: Option<PathBuf>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source,
            default_thumbnail,
        }
    }

    /// Writes a JPEG to `run.thumbnail_path()`.
    ///
    /// Tries the high-resolution still, then the standard still, then asks the
    /// video source, then copies the configured default image. `None` when all
    /// of them fail.
    pub async fn acquire(&self, video: &VideoSource, run: &RunArtifacts) -> Option<PathBuf> {
        let dest = run.thumbnail_path();

        for name in STILL_NAMES {
            let url = format!("{}/vi/{}/{}", self.base_url, video.video_id, name);
            match self.download(&url).await {
                Ok(bytes) => match fs::write(&dest, bytes).await {
                    Ok(()) => {
                        debug!(%url, "thumbnail downloaded");
                        return Some(dest);
                    }
                    Err(e) => warn!(error = %e, "could not write thumbnail"),
                },
                Err(reason) => debug!(%url, %reason, "thumbnail still unavailable"),
            }
        }

        match self.source.download_thumbnail(video, run.root()).await {
            Ok(src) => {
                let converted: Result<()> = if src.extension().is_some_and(|e| e == "jpg") {
                    fs::copy(&src, &dest).await.map(|_| ()).map_err(Into::into)
                } else {
                    convert_to_jpeg(&src, &dest).await
                };
                let _ = fs::remove_file(&src).await;
                match converted {
                    Ok(()) => return Some(dest),
                    Err(e) => warn!(error = %e, "could not convert downloaded thumbnail"),
                }
            }
            Err(e) => debug!(error = %e, "source thumbnail unavailable"),
        }

        if let Some(default) = &self.default_thumbnail {
            match fs::copy(default, &dest).await {
                Ok(_) => {
                    warn!(video_id = %video.video_id, "using default thumbnail");
                    return Some(dest);
                }
                Err(e) => {
                    warn!(path = %default.display(), error = %e, "default thumbnail unreadable")
                }
            }
        }

        warn!(video_id = %video.video_id, "no thumbnail available");
        None
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status().as_u16()));
        }
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        if bytes.is_empty() {
            return Err("empty body".to_string());
        }
        Ok(bytes.to_vec())
    }
}
