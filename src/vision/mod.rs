//! Vision-language model integration
//!
//! The model is the robot's only perception source. Each request carries one
//! camera frame and a fixed prompt, and returns free text:
//!
//! ```text
//! Frame ──JPEG/base64──► VisionModel::ask(frame, prompt) ──► Some(text) | None
//!                              │
//!                              └── Err(Unauthorized) → fatal, pursuit aborts
//! ```
//!
//! - `frame` - camera frames and their encoding
//! - `gemini` - REST client for Gemini `generateContent`
//! - `retry` - retry/backoff wrapper for any model

pub mod frame;
pub mod gemini;
pub mod retry;

use async_trait::async_trait;

pub use frame::Frame;
pub use gemini::{GeminiClient, GeminiConfig, GeminiConfigError};
pub use retry::{RetryPolicy, RetryingModel};

/// Error type for vision model requests
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Authentication or permission failure; never retried
    #[error("vision model rejected credentials: {0}")]
    Unauthorized(String),
    /// HTTP transport failure (connect, timeout, TLS); the URL is stripped
    #[error("request error: {0}")]
    Request(reqwest::Error),
    /// Non-success HTTP status other than an auth failure
    #[error("vision model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Response body did not have the expected shape
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Request succeeded but carried no text
    #[error("empty response from vision model")]
    EmptyResponse,
    /// The frame could not be encoded for upload
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
}

impl From<reqwest::Error> for VisionError {
    fn from(e: reqwest::Error) -> Self {
        VisionError::Request(e.without_url())
    }
}

impl VisionError {
    /// Fatal errors abort the whole pursuit rather than one step
    pub fn is_fatal(&self) -> bool {
        matches!(self, VisionError::Unauthorized(_))
    }

    /// Label used for the failure metric
    pub fn kind(&self) -> &'static str {
        if self.is_fatal() {
            "unauthorized"
        } else {
            "transient"
        }
    }
}

/// A remote model that answers a prompt about one image
///
/// `Ok(None)` means "no usable answer" (after any internal retries).
/// `Err` with [`VisionError::is_fatal`] must be propagated; other errors
/// are treated by callers like `Ok(None)`.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn ask(&self, frame: &Frame, prompt: &str) -> Result<Option<String>, VisionError>;

    /// Model name for logs and metrics
    fn model_name(&self) -> &str;
}
