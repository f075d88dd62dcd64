use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use async_trait::async_trait;
use regex::Regex;
use tokio::{fs, process::Command};
use tracing::{debug, warn};

use crate::{
    artifacts::RunArtifacts,
    error::{CookitError, Result},
    types::VideoSource,
};

static TRACKING_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[&?](t|si|ab_channel|pp|list|index|feature)=[^&#]*").unwrap());

static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"[?&]v=([A-Za-z0-9_-]{6,})").unwrap(),
        Regex::new(r"youtu\.be/([A-Za-z0-9_-]{6,})").unwrap(),
        Regex::new(r"/shorts/([A-Za-z0-9_-]{6,})").unwrap(),
        Regex::new(r"/embed/([A-Za-z0-9_-]{6,})").unwrap(),
        Regex::new(r"/live/([A-Za-z0-9_-]{6,})").unwrap(),
    ]
});

/// Drops timestamp, share and playlist parameters so one video maps to one URL.
pub fn clean_url(url: &str) -> String {
    let url = url.trim();
    let cleaned = TRACKING_PARAMS.replace_all(url, "").into_owned();
    // `?t=..&v=..` loses its leading `?` above
    if !cleaned.contains('?') && let Some(pos) = cleaned.find('&') {
        let mut fixed = cleaned.clone();
        fixed.replace_range(pos..pos + 1, "?");
        return fixed;
    }
    cleaned
}

pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .map(|caps| caps[1].to_string())
}

/// Normalizes a user supplied URL into a [`VideoSource`].
pub fn resolve_source(url: &str) -> Result<VideoSource> {
    let cleaned = clean_url(url);
    let video_id = extract_video_id(&cleaned).ok_or_else(|| CookitError::InvalidUrl {
        url: url.to_string(),
    })?;

    Ok(VideoSource {
        video_id,
        url: cleaned,
        title: None,
        channel: None,
    })
}

/// Where videos, captions and thumbnails come from.
#[async_trait]
pub trait VideoSourceProvider: Send + Sync {
    async fn download_video(&self, source: &VideoSource, run: &RunArtifacts) -> Result<PathBuf>;

    /// `Ok(None)` when the video has no caption track in the wanted language.
    async fn download_captions(
        &self,
        source: &VideoSource,
        run: &RunArtifacts,
    ) -> Result<Option<PathBuf>>;

    async fn fetch_title(&self, source: &VideoSource) -> Result<Option<String>>;

    async fn download_thumbnail(&self, source: &VideoSource, dest_dir: &Path) -> Result<PathBuf>;
}

/// [`VideoSourceProvider`] backed by the `yt-dlp` binary.
pub struct YtDlp {
    binary: String,
    caption_lang: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".into(),
            caption_lang: "ko".into(),
        }
    }
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, caption_lang: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            caption_lang: caption_lang.into(),
        }
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(url)
            .arg("--no-playlist")
            .arg("--extractor-args")
            .arg("youtube:player_client=android,web");
        cmd
    }
}

#[async_trait]
impl VideoSourceProvider for YtDlp {
    async fn download_video(&self, source: &VideoSource, run: &RunArtifacts) -> Result<PathBuf> {
        let output = self
            .command(&source.url)
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-f")
            .arg("best[ext=mp4]/best")
            .arg("-o")
            .arg(run.video_template())
            .output()
            .await?;

        if !output.status.success() {
            return Err(CookitError::DownloadFailed {
                url: source.url.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout.lines().last().map(str::trim).unwrap_or_default();
        let path = if printed.is_empty() {
            run.find_video()
        } else {
            Some(PathBuf::from(printed))
        };

        path.filter(|p| p.exists())
            .ok_or_else(|| CookitError::DownloadFailed {
                url: source.url.clone(),
                reason: "yt-dlp finished without producing a video file".into(),
            })
    }

    async fn download_captions(
        &self,
        source: &VideoSource,
        run: &RunArtifacts,
    ) -> Result<Option<PathBuf>> {
        let dir = run.captions_dir();
        fs::create_dir_all(&dir).await?;

        let output = self
            .command(&source.url)
            .arg("--skip-download")
            .arg("--write-sub")
            .arg("--write-auto-sub")
            .arg("--sub-lang")
            .arg(&self.caption_lang)
            .arg("--sub-format")
            .arg("vtt/srt/best")
            .arg("-o")
            .arg(dir.join(format!("{}.%(ext)s", source.video_id)))
            .output()
            .await?;

        if !output.status.success() {
            warn!(
                video_id = %source.video_id,
                "caption download failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let found = run.find_caption_file();
        debug!(video_id = %source.video_id, found = found.is_some(), "caption lookup finished");
        Ok(found)
    }

    async fn fetch_title(&self, source: &VideoSource) -> Result<Option<String>> {
        let output = self
            .command(&source.url)
            .arg("--skip-download")
            .arg("--print")
            .arg("title")
            .output()
            .await?;

        if !output.status.success() {
            return Ok(None);
        }
        let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(title).filter(|t| !t.is_empty()))
    }

    async fn download_thumbnail(&self, source: &VideoSource, dest_dir: &Path) -> Result<PathBuf> {
        let output = self
            .command(&source.url)
            .arg("--skip-download")
            .arg("--write-thumbnail")
            .arg("--convert-thumbnails")
            .arg("jpg")
            .arg("-o")
            .arg(dest_dir.join("thumbnail_src.%(ext)s"))
            .output()
            .await?;

        if !output.status.success() {
            return Err(CookitError::DownloadFailed {
                url: source.url.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        for ext in ["jpg", "webp", "png"] {
            let path = dest_dir.join(format!("thumbnail_src.{ext}"));
            if path.exists() {
                return Ok(path);
            }
        }
        Err(CookitError::DownloadFailed {
            url: source.url.clone(),
            reason: "yt-dlp wrote no thumbnail".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_parameters_are_removed() {
        assert_eq!(
            clean_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s&si=abc&ab_channel=Chef"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            clean_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1&pp=xyz"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            clean_url("https://youtu.be/dQw4w9WgXcQ?si=share"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn video_ids_are_found_in_every_url_form() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(url).as_deref(), Some("dQw4w9WgXcQ"), "{url}");
        }
    }

    #[test]
    fn urls_without_a_video_fail_fast() {
        let err = resolve_source("https://www.youtube.com/@somechannel").unwrap_err();
        assert!(matches!(err, CookitError::InvalidUrl { .. }));
    }

    #[test]
    fn resolve_keeps_cleaned_url() {
        let source = resolve_source(" https://youtu.be/abcdef123?t=10 ").unwrap();
        assert_eq!(source.video_id, "abcdef123");
        assert_eq!(source.url, "https://youtu.be/abcdef123");
    }
}
