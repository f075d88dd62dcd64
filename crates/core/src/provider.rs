//! Hosted generative model clients.
//!
//! Gemini is called through its native `generateContent` API because that is
//! the only one of the three that accepts the video itself. OpenAI and Grok go
//! through the chat completions API and only ever see the prompt text.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing API key for {provider_name}")]
    MissingApiKey { provider_name: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider_name} returned HTTP {status}: {body}")]
    Api {
        provider_name: String,
        status: u16,
        body: String,
    },

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model returned no text")]
    EmptyResponse,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Timeout(_) => true,
            ProviderError::MissingApiKey { .. } | ProviderError::EmptyResponse => false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Openai,
    Grok,
}

pub struct ProviderConfig {
    pub base_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Gemini => ProviderConfig {
                base_url: "https://generativelanguage.googleapis.com",
                model: "gemini-2.5-flash",
                env_var: "GEMINI_API_KEY",
            },
            Provider::Openai => ProviderConfig {
                base_url: "https://api.openai.com",
                model: "gpt-5.1",
                env_var: "OPENAI_API_KEY",
            },
            Provider::Grok => ProviderConfig {
                base_url: "https://api.x.ai",
                model: "grok-4-fast",
                env_var: "XAI_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
        }
    }

    pub fn accepts_video(&self) -> bool {
        matches!(self, Provider::Gemini)
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String, ProviderError> {
        self.api_key_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Provider::validate_api_key`] with an injectable variable
    /// source. A blank value counts as missing.
    pub fn api_key_from<F>(&self, lookup: F) -> Result<String, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(self.config().env_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider_name: self.name().to_string(),
            })
    }
}

/// Sampling and transport settings for one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// Extra attempts after the first failure. Zero means at-most-once.
    pub retries: u32,
    pub timeout: Option<Duration>,
    pub max_inline_video_bytes: u64,
}

impl GenerationConfig {
    pub fn for_provider(provider: &Provider) -> Self {
        Self {
            model: provider.config().model.to_string(),
            temperature: 0.3,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
            retries: 0,
            timeout: None,
            max_inline_video_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl VideoPayload {
    /// Loads a video for inline upload. Missing, empty or oversized files give `None`.
    pub async fn load(path: &Path, max_bytes: u64) -> Option<Self> {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %path.display(), "video file unavailable: {}", e);
                return None;
            }
        };
        if size == 0 {
            warn!(path = %path.display(), "video file is empty");
            return None;
        }
        if size > max_bytes {
            warn!(
                path = %path.display(),
                size_bytes = size,
                max_bytes,
                "video too large for inline upload"
            );
            return None;
        }

        match tokio::fs::read(path).await {
            Ok(bytes) => Some(Self {
                bytes,
                mime_type: "video/mp4".into(),
            }),
            Err(e) => {
                warn!(path = %path.display(), "failed to read video file: {}", e);
                None
            }
        }
    }
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        video: Option<&VideoPayload>,
    ) -> Result<String, ProviderError>;
}

// Gemini native API types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

// OpenAI-compatible chat completion types

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

pub struct ProviderClient {
    provider: Provider,
    api_key: String,
    config: GenerationConfig,
    base_url: String,
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new(
        provider: Provider,
        api_key: impl Into<String>,
        config: GenerationConfig,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey {
                provider_name: provider.name().to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: provider.config().base_url.to_string(),
            provider,
            api_key,
            config,
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    async fn call_once(
        &self,
        prompt: &str,
        video: Option<&VideoPayload>,
    ) -> Result<String, ProviderError> {
        let call = async {
            match self.provider {
                Provider::Gemini => self.call_gemini(prompt, video).await,
                Provider::Openai | Provider::Grok => self.call_chat(prompt).await,
            }
        };

        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProviderError::Timeout(limit))?,
            None => call.await,
        }
    }

    async fn call_gemini(
        &self,
        prompt: &str,
        video: Option<&VideoPayload>,
    ) -> Result<String, ProviderError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(video) = video {
            parts.push(GeminiPart::Inline {
                inline_data: GeminiInlineData {
                    mime_type: video.mime_type.clone(),
                    data: STANDARD.encode(&video.bytes),
                },
            });
        }
        parts.push(GeminiPart::Text { text: prompt });

        let request = GeminiRequest {
            contents: vec![GeminiContent { role: "user", parts }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                top_k: self.config.top_k,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        );
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let body: GeminiResponse = response.json().await?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        non_empty(text)
    }

    async fn call_chat(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_output_tokens,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;
        let response = self.check_status(response).await?;
        let body: ChatResponse = response.json().await?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        non_empty(text)
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            provider_name: self.provider.name().to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn non_empty(text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

#[async_trait]
impl GenerativeModel for ProviderClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        prompt: &str,
        video: Option<&VideoPayload>,
    ) -> Result<String, ProviderError> {
        let video = match video {
            None => {
                info!(
                    provider = self.provider.name(),
                    "no video payload, summarizing from text only"
                );
                None
            }
            Some(_) if !self.provider.accepts_video() => {
                info!(
                    provider = self.provider.name(),
                    "provider does not accept video, summarizing from text only"
                );
                None
            }
            Some(v) => Some(v),
        };

        let mut attempt = 0;
        loop {
            debug!(
                provider = self.provider.name(),
                model = %self.config.model,
                attempt = attempt + 1,
                prompt_chars = prompt.chars().count(),
                with_video = video.is_some(),
                "calling generative model"
            );

            match self.call_once(prompt, video).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        provider = self.provider.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "model call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
