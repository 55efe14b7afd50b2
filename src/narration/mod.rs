//! Spoken narration of what the robot sees and does
//!
//! Narration is fire-and-forget: a [`Narrator`] never returns an error and
//! never holds up the control loop beyond its playback timeout.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

/// Upper bound on one utterance's playback
pub const DEFAULT_PLAYBACK_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Narrator: Send + Sync {
    async fn speak(&self, text: &str);
}

/// Prints utterances to stdout
#[derive(Debug, Default, Clone)]
pub struct ConsoleNarrator;

#[async_trait]
impl Narrator for ConsoleNarrator {
    async fn speak(&self, text: &str) {
        info!(text, "narration");
        println!("[Robot says]: {}", text);
    }
}

/// Speaks through an external text-to-speech program
///
/// The text is passed as the last argument, e.g. `espeak -s 150 "<text>"`.
/// The program is killed if it runs past the playback timeout.
#[derive(Debug, Clone)]
pub struct CommandNarrator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNarrator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_PLAYBACK_TIMEOUT,
        }
    }

    /// `espeak` with default settings
    pub fn espeak() -> Self {
        Self::new("espeak", Vec::new())
    }

    /// Build from a whitespace separated command line ("espeak -s 150")
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Narrator for CommandNarrator {
    async fn speak(&self, text: &str) {
        println!("[Robot says]: {}", text);

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match child {
            Ok(c) => c,
            Err(e) => {
                warn!(program = %self.program, error = %e, "Speech program unavailable");
                return;
            }
        };

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                warn!(program = %self.program, %status, "Speech program failed");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(program = %self.program, error = %e, "Speech playback error"),
            Err(_) => {
                warn!(program = %self.program, timeout_s = self.timeout.as_secs_f64(), "Speech playback timed out");
                let _ = child.kill().await;
            }
        }
    }
}

/// Keeps every utterance in memory; useful for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct TranscriptNarrator {
    lines: Arc<Mutex<Vec<String>>>,
}

impl TranscriptNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything spoken so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// True if any utterance contains `needle`
    pub fn heard(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

#[async_trait]
impl Narrator for TranscriptNarrator {
    async fn speak(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_ignored() {
        let narrator = CommandNarrator::new("robogo-no-such-tts-program", Vec::new());
        narrator.speak("hello").await;
    }

    #[tokio::test]
    async fn test_timeout_kills_program() {
        let narrator = CommandNarrator::new("sleep", Vec::new())
            .with_timeout(Duration::from_millis(50));
        let started = std::time::Instant::now();
        // "sleep 5" would block for five seconds without the timeout
        narrator.speak("5").await;
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_from_command_line() {
        let narrator = CommandNarrator::from_command_line("espeak -s 150").unwrap();
        assert_eq!(narrator.program, "espeak");
        assert_eq!(narrator.args, vec!["-s", "150"]);
        assert!(CommandNarrator::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn test_transcript_records_lines() {
        let narrator = TranscriptNarrator::new();
        narrator.speak("Goal is not visible.").await;
        narrator.speak("Scanning.").await;
        assert_eq!(narrator.lines().len(), 2);
        assert!(narrator.heard("Scanning"));
        assert!(!narrator.heard("reached"));
    }
}
