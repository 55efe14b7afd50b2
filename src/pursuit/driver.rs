//! Pursuit loop driver - owns the collaborators and runs the step loop
//!
//! One pursuit is a bounded sequence of perceive-decide-act steps. The
//! driver exclusively owns the camera and the motors for its lifetime and
//! leaves the motors stopped on every exit path.

use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::observation::parse;
use super::prompt::{navigation_prompt, SCENE_PROMPT};
use super::selector::{ActionSelector, PursuitState, LOST_GOAL_THRESHOLD, MAX_CORRECTIONS};
use crate::actuator::{Actuator, Direction};
use crate::camera::Camera;
use crate::metrics::{CAPTURE_FAILURES, PARSE_INCOMPLETE, PURSUITS, PURSUIT_STEPS, VISION_FAILURES};
use crate::narration::Narrator;
use crate::vision::{Frame, VisionError, VisionModel};

/// Spoken once when the model rejects our credentials
const AUTH_FAILURE: &str =
    "My connection to the vision system failed due to an authentication error. Please check the API key.";

/// Turn issued when the model gives no advice for a step
const NO_ADVICE_TURN: Duration = Duration::from_millis(500);

/// Configuration for the pursuit driver
#[derive(Debug, Clone)]
pub struct PursuitConfig {
    /// Step budget per pursuit
    pub max_steps: u32,
    /// Consecutive unseen steps before a wide scan
    pub lost_goal_threshold: u32,
    /// Re-centring turns allowed per pursuit
    pub max_corrections: u32,
    /// Pause after an empty capture before retrying the same step
    pub capture_retry_pause: Duration,
    /// Pause after the fallback turn of a step without advice
    pub advice_failure_pause: Duration,
    /// Pause at the end of every decided step
    pub step_pause: Duration,
    /// Empty captures in a row that abort the pursuit; 0 retries forever
    pub max_consecutive_capture_failures: u32,
    /// Seed for left/right choices; entropy when None
    pub seed: Option<u64>,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            lost_goal_threshold: LOST_GOAL_THRESHOLD,
            max_corrections: MAX_CORRECTIONS,
            capture_retry_pause: Duration::from_secs(1),
            advice_failure_pause: Duration::from_millis(500),
            step_pause: Duration::from_millis(600),
            max_consecutive_capture_failures: 10,
            seed: None,
        }
    }
}

impl PursuitConfig {
    /// Defaults with every pause set to zero (simulation and tests)
    pub fn without_pauses() -> Self {
        Self {
            capture_retry_pause: Duration::ZERO,
            advice_failure_pause: Duration::ZERO,
            step_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Result of a pursuit that ran to completion
#[derive(Debug, Clone)]
pub struct PursuitReport {
    /// True if the goal was reached
    pub reached: bool,
    /// Steps that consumed budget (capture retries excluded)
    pub steps_completed: u32,
    /// Empty or missing captures, all retried
    pub capture_failures: u32,
    /// Steps where the model gave no usable advice
    pub advice_failures: u32,
    /// Counters as they stood at the end
    pub final_state: PursuitState,
    /// Unique trace ID for this pursuit
    pub trace_id: String,
}

/// Errors that abort a pursuit
#[derive(Debug, thiserror::Error)]
pub enum PursuitError {
    /// Authentication or permission failure talking to the model
    #[error("vision model failure: {0}")]
    Vision(#[source] VisionError),
    /// The camera kept returning nothing
    #[error("camera delivered no frame for {0} consecutive attempts")]
    CameraUnavailable(u32),
    #[error("goal object must not be empty")]
    EmptyGoal,
}

/// What one step did
enum StepOutcome {
    /// No frame; the step index is retried
    CaptureFailed,
    /// No advice; a fallback turn was made and the step consumed
    NoAdvice,
    /// Advice parsed and acted on
    Acted { reached: bool },
}

/// Drives the perceive-decide-act loop
pub struct PursuitDriver {
    camera: Box<dyn Camera>,
    model: Box<dyn VisionModel>,
    narrator: Arc<dyn Narrator>,
    actuator: Box<dyn Actuator>,
    selector: ActionSelector,
    config: PursuitConfig,
    rng: ChaCha8Rng,
    camera_started: bool,
}

impl PursuitDriver {
    /// Create a new driver
    ///
    /// # Arguments
    /// * `camera` - frame source, started lazily on first use
    /// * `model` - vision model, usually wrapped in `RetryingModel`
    /// * `narrator` - speech output
    /// * `actuator` - motors, real or simulated
    /// * `config` - step budget, thresholds and pauses
    pub fn new(
        camera: Box<dyn Camera>,
        model: Box<dyn VisionModel>,
        narrator: Arc<dyn Narrator>,
        actuator: Box<dyn Actuator>,
        config: PursuitConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let selector = ActionSelector::new(config.lost_goal_threshold, config.max_corrections);

        Self {
            camera,
            model,
            narrator,
            actuator,
            selector,
            config,
            rng,
            camera_started: false,
        }
    }

    pub fn config(&self) -> &PursuitConfig {
        &self.config
    }

    async fn ensure_camera(&mut self) {
        if !self.camera_started {
            self.camera.start().await;
            self.camera_started = true;
        }
    }

    async fn capture(&mut self) -> Option<Frame> {
        self.ensure_camera().await;
        self.camera.capture().await.filter(|frame| !frame.is_empty())
    }

    async fn speak(&self, text: &str) {
        self.narrator.speak(text).await;
    }

    /// Describe the scene once, before any pursuit
    ///
    /// Returns the description, or `None` if no frame or no answer was
    /// available. Only an authentication failure is an error.
    pub async fn survey_scene(&mut self) -> Result<Option<String>, PursuitError> {
        let Some(frame) = self.capture().await else {
            self.speak("I couldn't get an initial image from the camera.").await;
            return Ok(None);
        };

        match self.model.ask(&frame, SCENE_PROMPT).await {
            Ok(Some(description)) if !description.trim().is_empty() => {
                self.speak(description.trim()).await;
                Ok(Some(description.trim().to_string()))
            }
            Err(e) if e.is_fatal() => {
                self.speak(AUTH_FAILURE).await;
                Err(PursuitError::Vision(e))
            }
            Ok(_) | Err(_) => {
                self.speak("I had trouble describing the initial scene.").await;
                Ok(None)
            }
        }
    }

    /// Pursue `goal_object` with the configured step budget
    pub async fn pursue(&mut self, goal_object: &str) -> Result<PursuitReport, PursuitError> {
        let max_steps = self.config.max_steps;
        self.pursue_for(goal_object, max_steps).await
    }

    /// Pursue `goal_object` for at most `max_steps` steps
    ///
    /// `Ok(report)` covers both success and exhaustion (`report.reached`).
    /// `Err` means the pursuit was aborted; the motors are stopped either way.
    pub async fn pursue_for(
        &mut self,
        goal_object: &str,
        max_steps: u32,
    ) -> Result<PursuitReport, PursuitError> {
        let goal = goal_object.trim().to_string();
        if goal.is_empty() {
            return Err(PursuitError::EmptyGoal);
        }

        let trace_id = Uuid::now_v7().to_string();
        let root_span = info_span!(
            "pursuit",
            trace_id = %trace_id,
            goal = %goal,
            max_steps,
            otel.name = "pursuit"
        );

        let result = self
            .run(goal, max_steps, trace_id)
            .instrument(root_span)
            .await;

        match &result {
            Ok(report) => {
                let outcome = if report.reached { "reached" } else { "exhausted" };
                PURSUITS.with_label_values(&[outcome]).inc();
                PURSUIT_STEPS.observe(report.steps_completed as f64);
            }
            Err(e) => {
                warn!(error = %e, "Pursuit aborted");
                PURSUITS.with_label_values(&["aborted"]).inc();
                self.actuator.stop().await;
            }
        }
        result
    }

    async fn run(
        &mut self,
        goal: String,
        max_steps: u32,
        trace_id: String,
    ) -> Result<PursuitReport, PursuitError> {
        info!(trace_id = %trace_id, goal = %goal, "Starting pursuit");
        self.speak(&format!("Okay, I will look for the {}.", goal)).await;

        let prompt = navigation_prompt(&goal);
        let mut state = PursuitState::new(goal.clone());
        let mut steps_completed = 0;
        let mut capture_failures = 0;
        let mut consecutive_capture_failures = 0;
        let mut advice_failures = 0;

        while steps_completed < max_steps {
            state.step = steps_completed;
            let step_span = info_span!(
                "pursuit_step",
                trace_id = %trace_id,
                step = steps_completed + 1,
                otel.name = "pursuit_step"
            );

            let outcome = self
                .step(&prompt, &mut state, max_steps)
                .instrument(step_span)
                .await?;

            match outcome {
                StepOutcome::CaptureFailed => {
                    capture_failures += 1;
                    consecutive_capture_failures += 1;
                    let limit = self.config.max_consecutive_capture_failures;
                    if limit > 0 && consecutive_capture_failures >= limit {
                        self.speak("My camera is not giving me any images. I have to stop.").await;
                        return Err(PursuitError::CameraUnavailable(consecutive_capture_failures));
                    }
                    pause(self.config.capture_retry_pause).await;
                    continue;
                }
                StepOutcome::NoAdvice => {
                    consecutive_capture_failures = 0;
                    advice_failures += 1;
                    steps_completed += 1;
                    pause(self.config.advice_failure_pause).await;
                    continue;
                }
                StepOutcome::Acted { reached } => {
                    consecutive_capture_failures = 0;
                    steps_completed += 1;
                    if reached {
                        self.speak(&format!("I have reached the {}! Pursuit successful.", goal))
                            .await;
                        self.actuator.stop().await;
                        info!(trace_id = %trace_id, steps = steps_completed, "Goal reached");
                        return Ok(PursuitReport {
                            reached: true,
                            steps_completed,
                            capture_failures,
                            advice_failures,
                            final_state: state,
                            trace_id,
                        });
                    }
                }
            }

            pause(self.config.step_pause).await;
        }

        info!(trace_id = %trace_id, steps = steps_completed, "Step budget exhausted");
        self.speak(&format!(
            "Maximum steps reached. I could not definitively reach the {}.",
            goal
        ))
        .await;
        self.actuator.stop().await;

        Ok(PursuitReport {
            reached: false,
            steps_completed,
            capture_failures,
            advice_failures,
            final_state: state,
            trace_id,
        })
    }

    /// One perceive-decide-act cycle
    async fn step(
        &mut self,
        prompt: &str,
        state: &mut PursuitState,
        max_steps: u32,
    ) -> Result<StepOutcome, PursuitError> {
        info!(
            "Step {}/{} | Goal: {}",
            state.step + 1,
            max_steps,
            state.goal_object.to_uppercase()
        );

        let Some(frame) = self.capture().await else {
            warn!(camera = self.camera.name(), "Empty capture, retrying step");
            CAPTURE_FAILURES.inc();
            self.speak("I couldn't get an image from the camera for this step.").await;
            return Ok(StepOutcome::CaptureFailed);
        };

        let advice = match self.model.ask(&frame, prompt).await {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) if e.is_fatal() => {
                self.speak(AUTH_FAILURE).await;
                return Err(PursuitError::Vision(e));
            }
            Err(e) => {
                warn!(error = %e, "Vision model failed for this step");
                VISION_FAILURES.with_label_values(&[e.kind()]).inc();
                None
            }
        };

        let Some(advice) = advice else {
            self.speak("I could not get navigation advice for this view. I will try turning.")
                .await;
            let direction = if self.rng.gen_bool(0.5) {
                Direction::Left
            } else {
                Direction::Right
            };
            self.actuator.drive(direction, NO_ADVICE_TURN).await;
            return Ok(StepOutcome::NoAdvice);
        };

        let parsed = parse(&advice);
        if let Some(issue) = parsed.issue {
            PARSE_INCOMPLETE.inc();
            warn!(?issue, advice = %advice, "Advice parsed with defaults");
            self.speak(issue.narration()).await;
        }

        let obs = parsed.observation;
        info!(
            goal_visible = obs.goal_visible,
            direction = %obs.goal_direction,
            proximity = %obs.goal_proximity,
            path = %obs.path_status,
            obstacle = %obs.obstacle_info,
            "Observation"
        );
        self.speak(&obs.summary()).await;

        let plan = self.selector.select(&obs, state, &mut self.rng);
        for remark in &plan.remarks {
            self.speak(remark).await;
        }
        for mv in &plan.moves {
            self.actuator.drive(mv.direction, mv.duration).await;
        }

        Ok(StepOutcome::Acted {
            reached: plan.is_success(),
        })
    }

    /// Stop the motors and release the camera
    ///
    /// Safe to call repeatedly, and after an interrupted pursuit.
    pub async fn shutdown(&mut self) {
        self.actuator.stop().await;
        self.camera.stop().await;
        self.camera_started = false;
        info!(
            actuator = self.actuator.name(),
            camera = self.camera.name(),
            "Driver shut down"
        );
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pursuit_config_defaults() {
        let config = PursuitConfig::default();
        assert_eq!(config.max_steps, 40);
        assert_eq!(config.lost_goal_threshold, 3);
        assert_eq!(config.max_corrections, 2);
        assert_eq!(config.capture_retry_pause, Duration::from_secs(1));
        assert_eq!(config.advice_failure_pause, Duration::from_millis(500));
        assert_eq!(config.step_pause, Duration::from_millis(600));
        assert!(config.max_consecutive_capture_failures > 0);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_without_pauses_keeps_budget() {
        let config = PursuitConfig::without_pauses();
        assert_eq!(config.max_steps, 40);
        assert!(config.capture_retry_pause.is_zero());
        assert!(config.advice_failure_pause.is_zero());
        assert!(config.step_pause.is_zero());
    }
}
