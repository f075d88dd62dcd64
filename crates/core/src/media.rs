use std::path::Path;

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::debug;

use crate::error::{CookitError, Result};

/// Extracts 16 kHz mono PCM audio, the format whisper expects.
pub async fn extract_audio(video_path: &Path, audio_path: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(video_path)
        .arg("-vn")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg("16000")
        .arg("-ac")
        .arg("1")
        .arg(audio_path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(CookitError::AudioExtractionFailed {
            video_path: video_path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// ffmpeg `-vf` argument sampling one frame every `interval_secs`.
pub fn frame_filter(interval_secs: u32, crop_bottom: bool) -> String {
    let fps = format!("fps=1/{}", interval_secs.max(1));
    if crop_bottom {
        format!("{fps},crop=iw:ih/4:0:ih*3/4")
    } else {
        fps
    }
}

/// Samples still frames into `frames_dir` as `frame_000001.jpg`, `frame_000002.jpg`, ...
///
/// Frame `n` (1-based file number) shows the picture at `(n - 1) * interval_secs`.
pub async fn extract_frames(
    video_path: &Path,
    frames_dir: &Path,
    interval_secs: u32,
    crop_bottom: bool,
) -> Result<()> {
    fs::create_dir_all(frames_dir).await?;

    let filter = frame_filter(interval_secs, crop_bottom);
    debug!(video = %video_path.display(), %filter, "sampling frames");

    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(video_path)
        .arg("-vf")
        .arg(&filter)
        .arg(frames_dir.join("frame_%06d.jpg"))
        .output()
        .await?;

    if !output.status.success() {
        return Err(CookitError::FrameExtractionFailed {
            video_path: video_path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Writes the picture shown at `at_secs` to `dest` as a JPEG.
pub async fn capture_frame(video_path: &Path, at_secs: u32, dest: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-ss")
        .arg(at_secs.to_string())
        .arg("-i")
        .arg(video_path)
        .arg("-frames:v")
        .arg("1")
        .arg("-q:v")
        .arg("2")
        .arg(dest)
        .output()
        .await?;

    let reason = if !output.status.success() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else if fs::metadata(dest).await.is_err() {
        // seeking past the end exits 0 without writing anything
        format!("no frame at {at_secs}s")
    } else {
        return Ok(());
    };

    Err(CookitError::FrameExtractionFailed {
        video_path: video_path.to_path_buf(),
        reason,
    })
}

/// Grabs single stills out of a video.
#[async_trait]
pub trait FrameGrabber: Send + Sync {
    async fn grab(&self, video_path: &Path, at_secs: u32, dest: &Path) -> Result<()>;
}

pub struct FfmpegFrameGrabber;

#[async_trait]
impl FrameGrabber for FfmpegFrameGrabber {
    async fn grab(&self, video_path: &Path, at_secs: u32, dest: &Path) -> Result<()> {
        debug!(video = %video_path.display(), at_secs, "capturing frame");
        capture_frame(video_path, at_secs, dest).await
    }
}

/// Re-encodes an image (e.g. a webp thumbnail) as JPEG.
pub async fn convert_to_jpeg(src: &Path, dest: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(src)
        .arg(dest)
        .output()
        .await?;

    if !output.status.success() {
        return Err(CookitError::IoError(std::io::Error::other(format!(
            "ffmpeg could not convert {}: {}",
            src.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))));
    }
    Ok(())
}
