use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    error::{CookitError, Result},
    format::format_timestamp,
    types::FrameText,
};

pub use crate::format::format_frame_texts;

/// Optical character recognition over a single image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &Path, language: &str) -> Result<String>;
}

/// [`TextRecognizer`] that shells out to the `tesseract` CLI.
pub struct TesseractCli {
    binary: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            binary: "tesseract".into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(&self, image: &Path, language: &str) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CookitError::IoError(std::io::Error::other(format!(
                "tesseract failed on {}: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Number embedded in a frame file name, `frame_1000.jpg` gives 1000.
fn frame_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    stem.trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()
}

/// Image files in `dir`, ordered by the frame number in their names.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| {
                    matches!(
                        ext.to_string_lossy().to_lowercase().as_str(),
                        "jpg" | "jpeg" | "png"
                    )
                })
                .unwrap_or(false)
        })
        .collect();
    frames.sort_by(|a, b| {
        frame_number(a)
            .cmp(&frame_number(b))
            .then_with(|| a.cmp(b))
    });
    Ok(frames)
}

pub fn frame_timestamp(index: usize, interval_secs: u32) -> String {
    format_timestamp(index as f64 * interval_secs as f64)
}

/// Runs recognition over every frame, keeping frame order.
///
/// A frame whose recognition fails is logged and skipped, as is a frame that
/// yields only whitespace. Up to `concurrency` frames are in flight at once.
pub async fn recognize_frames(
    recognizer: &dyn TextRecognizer,
    frames: &[PathBuf],
    language: &str,
    interval_secs: u32,
    concurrency: usize,
) -> Vec<FrameText> {
    let total = frames.len();
    let results: Vec<Option<FrameText>> = stream::iter(0..total)
        .map(|index| async move {
            let frame = &frames[index];
            match recognizer.recognize(frame, language).await {
                Ok(text) => {
                    debug!(frame = index + 1, total, "frame recognized");
                    let text = text.trim();
                    (!text.is_empty()).then(|| FrameText {
                        index,
                        timestamp: frame_timestamp(index, interval_secs),
                        text: text.to_string(),
                    })
                }
                Err(e) => {
                    warn!(frame = %frame.display(), "text recognition failed, skipping frame: {}", e);
                    None
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    results.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::*;

    struct ScriptedRecognizer {
        by_name: HashMap<&'static str, Option<&'static str>>,
    }

    #[async_trait]
    impl TextRecognizer for ScriptedRecognizer {
        async fn recognize(&self, image: &Path, _language: &str) -> Result<String> {
            let name = image.file_name().unwrap().to_str().unwrap();
            // later frames finish first to prove ordering does not depend on completion
            let n: u64 = name[6..9].parse().unwrap();
            tokio::time::sleep(Duration::from_millis(40 - n * 5)).await;
            match self.by_name.get(name).copied().flatten() {
                Some(text) => Ok(text.to_string()),
                None => Err(CookitError::IoError(std::io::Error::other("engine crashed"))),
            }
        }
    }

    fn frames(n: usize) -> Vec<PathBuf> {
        (1..=n)
            .map(|i| PathBuf::from(format!("/frames/frame_{i:03}.jpg")))
            .collect()
    }

    fn recognizer() -> ScriptedRecognizer {
        ScriptedRecognizer {
            by_name: HashMap::from([
                ("frame_001.jpg", Some("  양파 1개 ")),
                ("frame_002.jpg", Some("   \n")),
                ("frame_003.jpg", None),
                ("frame_004.jpg", Some("중불에서 5분")),
                ("frame_005.jpg", Some("완성")),
            ]),
        }
    }

    #[tokio::test]
    async fn empty_and_failed_frames_are_skipped() {
        let texts = recognize_frames(&recognizer(), &frames(5), "kor", 2, 1).await;

        let got: Vec<(&str, &str)> = texts
            .iter()
            .map(|f| (f.timestamp.as_str(), f.text.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("00:00:00", "양파 1개"),
                ("00:00:06", "중불에서 5분"),
                ("00:00:08", "완성"),
            ]
        );
    }

    #[tokio::test]
    async fn parallel_recognition_preserves_order() {
        let sequential = recognize_frames(&recognizer(), &frames(5), "kor", 2, 1).await;
        let parallel = recognize_frames(&recognizer(), &frames(5), "kor", 2, 4).await;
        assert_eq!(sequential, parallel);
        assert!(parallel.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn frames_are_listed_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_010.jpg", "frame_002.jpg", "notes.txt", "frame_001.jpg"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let listed: Vec<String> = list_frames(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(listed, vec!["frame_001.jpg", "frame_002.jpg", "frame_010.jpg"]);
    }

    #[test]
    fn frames_past_999_keep_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=1001 {
            std::fs::write(dir.path().join(format!("frame_{i:03}.jpg")), b"").unwrap();
        }

        let listed = list_frames(dir.path()).unwrap();
        assert_eq!(listed.len(), 1001);
        for (index, path) in listed.iter().enumerate() {
            assert_eq!(frame_number(path), Some(index as u64 + 1));
        }
        assert!(listed[999].ends_with("frame_1000.jpg"));
        assert_eq!(frame_timestamp(999, 2), "00:33:18");
    }
}
