//! Gemini `generateContent` client
//!
//! Sends one prompt plus one inline JPEG and returns the model's text.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Frame, VisionError, VisionModel};
use crate::metrics::VISION_CALL_TIME;

/// Default public endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Header carrying the API key; kept out of the URL so it never reaches logs
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini client
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header
    pub api_key: String,
    /// Model name without the `models/` prefix
    pub model: String,
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Error loading [`GeminiConfig`]
#[derive(Debug, thiserror::Error)]
pub enum GeminiConfigError {
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.2,
            max_output_tokens: 200,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Load from the environment
    ///
    /// Required: GEMINI_API_KEY
    /// Optional: GEMINI_MODEL, GEMINI_BASE_URL
    pub fn from_env() -> Result<Self, GeminiConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`GeminiConfig::from_env`], reading variables through `lookup`
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GeminiConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var(API_KEY_VAR).ok_or(GeminiConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key.trim());
        if let Some(model) = var("GEMINI_MODEL") {
            config.model = model.trim().to_string();
        }
        if let Some(base_url) = var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim().to_string();
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Client for the Gemini REST API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_request(&self, image_b64: String, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: image_b64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }

    /// Send one request, without retries
    pub async fn generate(&self, frame: &Frame, prompt: &str) -> Result<String, VisionError> {
        let image_b64 = frame.to_jpeg_base64()?;
        let body = self.build_request(image_b64, prompt);

        let started = Instant::now();
        let response = self
            .client
            .post(self.config.endpoint())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        VISION_CALL_TIME
            .with_label_values(&[&self.config.model])
            .observe(started.elapsed().as_secs_f64());
        debug!(status, bytes = text.len(), "Gemini response received");

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, text));
        }

        extract_text(&text)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn ask(&self, frame: &Frame, prompt: &str) -> Result<Option<String>, VisionError> {
        self.generate(frame, prompt).await.map(Some)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Map a non-2xx response to an error, separating auth failures
fn classify_failure(status: u16, body: String) -> VisionError {
    let lowered = body.to_lowercase();
    if status == 401
        || status == 403
        || lowered.contains("api key not valid")
        || lowered.contains("permission")
    {
        VisionError::Unauthorized(format!("HTTP {}: {}", status, body.trim()))
    } else {
        VisionError::Status { status, body }
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(body: &str) -> Result<String, VisionError> {
    let response: GenerateResponse = serde_json::from_str(body)?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    Part::Text { text } => Some(text),
                    Part::InlineData { .. } => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(VisionError::EmptyResponse);
    }
    Ok(text.to_string())
}
