//! On-disk layout for one pipeline run.
//!
//! Every intermediate file lives under `<work_dir>/<video_id>/<run_id>/`, so
//! two runs never share a path even when they process the same video.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::error::Result;

pub fn get_root_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("cookit")
}

pub fn get_model_dir(work_dir: &Path) -> PathBuf {
    work_dir.join("models")
}

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "webm", "mkv", "mov", "avi"];
const CAPTION_EXTENSIONS: [&str; 2] = ["vtt", "srt"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifacts {
    root: PathBuf,
}

impl RunArtifacts {
    pub fn new(work_dir: &Path, video_id: &str, run_id: Uuid) -> Self {
        Self {
            root: work_dir.join(video_id).join(run_id.to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Removes the whole run directory. Missing directories are not an error.
    pub async fn cleanup(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// yt-dlp output template for the downloaded video.
    pub fn video_template(&self) -> PathBuf {
        self.root.join("video.%(ext)s")
    }

    pub fn find_video(&self) -> Option<PathBuf> {
        find_with_extension(&self.root, "video", &VIDEO_EXTENSIONS)
    }

    pub fn captions_dir(&self) -> PathBuf {
        self.root.join("captions")
    }

    pub fn find_caption_file(&self) -> Option<PathBuf> {
        find_with_extension(&self.captions_dir(), "", &CAPTION_EXTENSIONS)
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn audio_path(&self) -> PathBuf {
        self.root.join("audio.wav")
    }

    pub fn ocr_text_path(&self) -> PathBuf {
        self.root.join("ocr.txt")
    }

    pub fn caption_text_path(&self) -> PathBuf {
        self.root.join("captions.txt")
    }

    pub fn speech_text_path(&self) -> PathBuf {
        self.root.join("speech.txt")
    }

    pub fn combined_text_path(&self) -> PathBuf {
        self.root.join("combined.txt")
    }

    pub fn prompt_path(&self) -> PathBuf {
        self.root.join("prompt.txt")
    }

    pub fn response_path(&self) -> PathBuf {
        self.root.join("response.txt")
    }

    pub fn recipe_path(&self) -> PathBuf {
        self.root.join("recipe.json")
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.root.join("thumbnail.jpg")
    }

    pub fn step_frames_dir(&self) -> PathBuf {
        self.root.join("step_frames")
    }
}

fn find_with_extension(dir: &Path, stem_prefix: &str, extensions: &[&str]) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut matches: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let stem_ok = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with(stem_prefix))
                .unwrap_or(false);
            let ext_ok = path
                .extension()
                .map(|ext| extensions.contains(&ext.to_string_lossy().to_lowercase().as_str()))
                .unwrap_or(false);
            stem_ok && ext_ok
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Reads an optional text artifact; a missing file is `None`.
pub async fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_are_namespaced_by_video_and_run() {
        let work = Path::new("/work");
        let a = RunArtifacts::new(work, "abc", Uuid::new_v4());
        let b = RunArtifacts::new(work, "abc", Uuid::new_v4());
        assert_ne!(a.root(), b.root());
        assert!(a.prompt_path().starts_with("/work/abc"));
    }

    #[tokio::test]
    async fn finds_downloaded_video_and_captions() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunArtifacts::new(dir.path(), "vid", Uuid::new_v4());
        run.ensure().await.unwrap();
        assert!(run.find_video().is_none());

        fs::write(run.root().join("video.mp4"), b"x").await.unwrap();
        fs::create_dir_all(run.captions_dir()).await.unwrap();
        fs::write(run.captions_dir().join("vid.ko.vtt"), b"WEBVTT")
            .await
            .unwrap();

        assert_eq!(run.find_video(), Some(run.root().join("video.mp4")));
        assert_eq!(
            run.find_caption_file(),
            Some(run.captions_dir().join("vid.ko.vtt"))
        );

        run.cleanup().await.unwrap();
        assert!(!run.root().exists());
        run.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn missing_optional_text_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_optional(&dir.path().join("nope.txt")).await.unwrap().is_none());
    }
}
