use std::{path::PathBuf, time::Duration};

use crate::{
    artifacts::get_root_work_dir,
    error::{CookitError, Result},
    provider::{GenerationConfig, Provider},
};

pub const DEFAULT_WHISPER_MODEL: &str = "ggml-medium-q5_0.bin";

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub language: String,
    pub interval_secs: u32,
    pub concurrency: usize,
    /// Only read the bottom quarter of each frame, where burned-in captions sit.
    pub crop_bottom: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "kor".into(),
            interval_secs: 2,
            concurrency: 1,
            crop_bottom: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub thumbnail_bucket: String,
    /// Bucket for the per-step frames, stored as `<video_id>/step_<n>.jpg`.
    pub step_thumbnail_bucket: String,
    pub default_category: String,
    pub default_thumbnail: Option<PathBuf>,
    pub thumbnail_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            thumbnail_bucket: "recipe-thumbnails".into(),
            step_thumbnail_bucket: "recipe-step-thumbnails".into(),
            default_category: "기타".into(),
            default_thumbnail: None,
            thumbnail_base_url: "https://img.youtube.com".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub provider: Provider,
    pub api_key: String,
    pub generation: GenerationConfig,
    pub supabase: Option<SupabaseConfig>,
    pub work_dir: PathBuf,
    pub ocr: OcrConfig,
    pub speech_language: String,
    pub whisper_model: String,
    pub upload: UploadConfig,
    pub stage_queue_capacity: usize,
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env(provider: Provider) -> Result<Self> {
        Self::from_lookup(provider, |key| std::env::var(key).ok())
    }

    /// Same as [`PipelineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(provider: Provider, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse = |key: &str| get(key).and_then(|v| v.trim().parse::<f64>().ok());

        let api_key = provider
            .api_key_from(&lookup)
            .map_err(|_| CookitError::missing_config(provider.config().env_var))?;

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_KEY")) {
            (Some(url), Some(service_key)) => Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                service_key,
            }),
            _ => None,
        };

        let defaults = GenerationConfig::for_provider(&provider);
        let generation = GenerationConfig {
            model: get("COOKIT_MODEL").unwrap_or(defaults.model),
            temperature: parse("COOKIT_TEMPERATURE")
                .map(|v| v as f32)
                .unwrap_or(defaults.temperature),
            top_k: parse("COOKIT_TOP_K")
                .map(|v| v as u32)
                .unwrap_or(defaults.top_k),
            top_p: parse("COOKIT_TOP_P")
                .map(|v| v as f32)
                .unwrap_or(defaults.top_p),
            max_output_tokens: parse("COOKIT_MAX_OUTPUT_TOKENS")
                .map(|v| v as u32)
                .unwrap_or(defaults.max_output_tokens),
            retries: parse("COOKIT_MODEL_RETRIES")
                .map(|v| v as u32)
                .unwrap_or(defaults.retries),
            timeout: parse("COOKIT_MODEL_TIMEOUT_SECS")
                .filter(|v| *v > 0.0)
                .map(Duration::from_secs_f64)
                .or(defaults.timeout),
            max_inline_video_bytes: parse("COOKIT_MAX_INLINE_VIDEO_MB")
                .map(|mb| (mb * 1024.0 * 1024.0) as u64)
                .unwrap_or(defaults.max_inline_video_bytes),
        };

        let ocr_defaults = OcrConfig::default();
        let ocr = OcrConfig {
            language: get("COOKIT_OCR_LANG").unwrap_or(ocr_defaults.language),
            interval_secs: parse("COOKIT_OCR_INTERVAL_SECS")
                .map(|v| v as u32)
                .filter(|v| *v > 0)
                .unwrap_or(ocr_defaults.interval_secs),
            concurrency: parse("COOKIT_OCR_CONCURRENCY")
                .map(|v| v as usize)
                .filter(|v| *v > 0)
                .unwrap_or(ocr_defaults.concurrency),
            crop_bottom: get("COOKIT_OCR_FULL_FRAME").is_none(),
        };

        let upload_defaults = UploadConfig::default();
        let upload = UploadConfig {
            thumbnail_bucket: get("COOKIT_THUMBNAIL_BUCKET")
                .unwrap_or(upload_defaults.thumbnail_bucket),
            step_thumbnail_bucket: get("COOKIT_STEP_THUMBNAIL_BUCKET")
                .unwrap_or(upload_defaults.step_thumbnail_bucket),
            default_category: get("COOKIT_DEFAULT_CATEGORY")
                .unwrap_or(upload_defaults.default_category),
            default_thumbnail: get("COOKIT_DEFAULT_THUMBNAIL").map(PathBuf::from),
            thumbnail_base_url: upload_defaults.thumbnail_base_url,
        };

        Ok(Self {
            provider,
            api_key,
            generation,
            supabase,
            work_dir: get("COOKIT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(get_root_work_dir),
            ocr,
            speech_language: get("COOKIT_SPEECH_LANG").unwrap_or_else(|| "ko".into()),
            whisper_model: get("COOKIT_WHISPER_MODEL")
                .unwrap_or_else(|| DEFAULT_WHISPER_MODEL.into()),
            upload,
            stage_queue_capacity: parse("COOKIT_STAGE_QUEUE")
                .map(|v| v as usize)
                .filter(|v| *v > 0)
                .unwrap_or(16),
        })
    }

    /// Supabase settings, required unless uploads are disabled.
    pub fn require_supabase(&self) -> Result<&SupabaseConfig> {
        self.supabase
            .as_ref()
            .ok_or_else(|| CookitError::missing_config("SUPABASE_URL / SUPABASE_SERVICE_KEY"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let err = PipelineConfig::from_lookup(Provider::Gemini, lookup(&[])).unwrap_err();
        assert!(matches!(err, CookitError::MissingConfig { key } if key == "GEMINI_API_KEY"));
    }

    #[test]
    fn defaults_match_observed_behavior() {
        let config =
            PipelineConfig::from_lookup(Provider::Gemini, lookup(&[("GEMINI_API_KEY", "k")]))
                .unwrap();

        assert_eq!(config.generation.model, "gemini-2.5-flash");
        assert_eq!(config.generation.top_k, 40);
        assert_eq!(config.generation.max_output_tokens, 8192);
        assert_eq!(config.generation.retries, 0);
        assert!(config.generation.timeout.is_none());
        assert_eq!(config.ocr.interval_secs, 2);
        assert_eq!(config.ocr.language, "kor");
        assert_eq!(config.upload.default_category, "기타");
        assert_eq!(config.upload.step_thumbnail_bucket, "recipe-step-thumbnails");
        assert!(config.supabase.is_none());
        assert!(config.require_supabase().is_err());
    }

    #[test]
    fn overrides_are_read_from_variables() {
        let config = PipelineConfig::from_lookup(
            Provider::Gemini,
            lookup(&[
                ("GEMINI_API_KEY", "k"),
                ("SUPABASE_URL", "https://db.example.com/"),
                ("SUPABASE_SERVICE_KEY", "s"),
                ("COOKIT_MODEL_RETRIES", "3"),
                ("COOKIT_MODEL_TIMEOUT_SECS", "30"),
                ("COOKIT_OCR_CONCURRENCY", "4"),
                ("COOKIT_WORK_DIR", "/tmp/cookit-test"),
            ]),
        )
        .unwrap();

        assert_eq!(config.generation.retries, 3);
        assert_eq!(config.generation.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.ocr.concurrency, 4);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/cookit-test"));
        assert_eq!(config.require_supabase().unwrap().url, "https://db.example.com");
    }
}
