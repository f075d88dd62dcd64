use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{
    artifacts::get_model_dir,
    error::{CookitError, Result},
    types::{Segment, Transcript},
};

#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;
}

/// Downloads the whisper model into the work directory unless it is already there.
pub async fn ensure_model(work_dir: &Path, model_name: &str) -> Result<PathBuf> {
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_name
    );
    let model_dir = get_model_dir(work_dir);

    if !model_dir.exists() {
        fs::create_dir_all(&model_dir).await?;
    }

    let model_path = model_dir.join(model_name);
    if !model_path.exists() {
        info!(model = model_name, "downloading whisper model");
        let output = Command::new("curl")
            .arg("-fL")
            .arg(&download_url)
            .arg("-o")
            .arg(&model_path)
            .output()
            .await?;

        if !output.status.success() {
            let _ = fs::remove_file(&model_path).await;
            return Err(CookitError::ModelDownloadFailed {
                url: download_url,
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
    }

    Ok(model_path)
}

pub struct WhisperTranscriber {
    model_path: PathBuf,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(model_path: PathBuf, language: impl Into<String>) -> Self {
        Self {
            model_path,
            language: language.into(),
        }
    }
}

fn read_samples(audio_path: &Path) -> Result<Vec<f32>> {
    let failed = |reason: String| CookitError::TranscriptFailed {
        audio_path: audio_path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::open(audio_path).map_err(|e| failed(e.to_string()))?;
    reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| failed(e.to_string()))
}

fn run_whisper(
    model_path: &Path,
    language: &str,
    samples: &[f32],
) -> std::result::Result<Transcript, String> {
    let model_path_str = model_path
        .to_str()
        .ok_or_else(|| format!("model path is not valid UTF-8: {}", model_path.display()))?;

    let ctx_params = WhisperContextParameters {
        use_gpu: true,
        flash_attn: true,
        ..Default::default()
    };
    let ctx = WhisperContext::new_with_params(model_path_str, ctx_params)
        .map_err(|e| format!("failed to load model: {e}"))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
    params.set_language(Some(language));
    params.set_print_progress(false);
    params.set_print_realtime(false);

    let mut state = ctx
        .create_state()
        .map_err(|e| format!("failed to create state: {e}"))?;
    state
        .full(params, samples)
        .map_err(|e| format!("failed to run model: {e}"))?;

    let mut text = String::new();
    let mut segments: Vec<Segment> = Vec::new();

    for segment in state.as_iter() {
        let Ok(seg_text) = segment.to_str() else {
            continue;
        };
        segments.push(Segment {
            start: segment.start_timestamp() as f64 / 100.0,
            end: segment.end_timestamp() as f64 / 100.0,
            text: seg_text.to_string(),
        });
        text.push_str(seg_text);
    }

    Ok(Transcript {
        language: language.to_string(),
        segments,
        text,
    })
}

#[async_trait]
impl SpeechTranscriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        let samples = read_samples(audio_path)?;
        let model_path = self.model_path.clone();
        let language = self.language.clone();

        let result =
            tokio::task::spawn_blocking(move || run_whisper(&model_path, &language, &samples))
                .await
                .map_err(|e| e.to_string())
                .and_then(|r| r);

        result.map_err(|reason| CookitError::TranscriptFailed {
            audio_path: audio_path.to_path_buf(),
            reason,
        })
    }
}
