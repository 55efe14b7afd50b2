//! Retry/backoff around a vision model
//!
//! Transient failures are retried with exponential backoff; once the budget
//! is spent the wrapper answers `Ok(None)`. Authentication failures are
//! returned immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{Frame, VisionError, VisionModel};
use crate::metrics::VISION_FAILURES;
use crate::narration::Narrator;

/// How often and how patiently to retry
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (0-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// A [`VisionModel`] that retries its inner model
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
    narrator: Arc<dyn Narrator>,
}

impl<M: VisionModel> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy, narrator: Arc<dyn Narrator>) -> Self {
        Self {
            inner,
            policy,
            narrator,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: VisionModel> VisionModel for RetryingModel<M> {
    async fn ask(&self, frame: &Frame, prompt: &str) -> Result<Option<String>, VisionError> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 0..attempts {
            match self.inner.ask(frame, prompt).await {
                Ok(Some(text)) if !text.trim().is_empty() => return Ok(Some(text)),
                Ok(_) => {
                    warn!(attempt = attempt + 1, attempts, "Vision model gave no answer");
                    VISION_FAILURES.with_label_values(&["no_answer"]).inc();
                }
                // Announced by the caller, which decides whether to stop
                Err(e) if e.is_fatal() => {
                    warn!(error = %e, "Vision model authentication failed");
                    VISION_FAILURES.with_label_values(&[e.kind()]).inc();
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, attempts, error = %e, "Vision model call failed");
                    VISION_FAILURES.with_label_values(&[e.kind()]).inc();
                }
            }

            if attempt + 1 < attempts {
                self.narrator
                    .speak(&format!("I'll retry analyzing the scene, attempt {}.", attempt + 2))
                    .await;
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        self.narrator
            .speak("I'm having trouble analyzing the scene after multiple retries.")
            .await;
        Ok(None)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::TranscriptNarrator;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of results, then answers `Ok(None)`
    struct Scripted {
        replies: Mutex<VecDeque<Result<Option<String>, VisionError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Option<String>, VisionError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl VisionModel for Scripted {
        async fn ask(&self, _: &Frame, _: &str) -> Result<Option<String>, VisionError> {
            *self.calls.lock().unwrap() += 1;
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_retries_until_answer() {
        let narrator = TranscriptNarrator::new();
        let model = RetryingModel::new(
            Scripted::new(vec![
                Err(VisionError::EmptyResponse),
                Ok(Some("GOAL VISIBLE: No".to_string())),
            ]),
            fast_policy(),
            Arc::new(narrator.clone()),
        );

        let answer = model.ask(&Frame::blank(4, 4), "prompt").await.unwrap();
        assert_eq!(answer.as_deref(), Some("GOAL VISIBLE: No"));
        assert_eq!(model.inner().calls(), 2);
        assert!(narrator.heard("attempt 2"));
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none() {
        let narrator = TranscriptNarrator::new();
        let model = RetryingModel::new(
            Scripted::new(vec![
                Err(VisionError::EmptyResponse),
                Err(VisionError::Status { status: 500, body: String::new() }),
                Ok(Some("   ".to_string())),
            ]),
            fast_policy(),
            Arc::new(narrator.clone()),
        );

        let answer = model.ask(&Frame::blank(4, 4), "prompt").await.unwrap();
        assert!(answer.is_none());
        assert_eq!(model.inner().calls(), 3);
        assert!(narrator.heard("after multiple retries"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let narrator = TranscriptNarrator::new();
        let model = RetryingModel::new(
            Scripted::new(vec![Err(VisionError::Unauthorized("API key not valid".into()))]),
            fast_policy(),
            Arc::new(narrator.clone()),
        );

        let err = model.ask(&Frame::blank(4, 4), "prompt").await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(model.inner().calls(), 1);
        assert!(narrator.lines().is_empty());
    }
}
