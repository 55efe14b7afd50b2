//! Integration tests for the pursuit driver
//!
//! The camera and the vision model are scripted; motors and speech are
//! recorded. Every pause is zero so the full 40-step budget runs instantly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use robogo::actuator::{Direction, MotorEvent, MotorLog, SimulatedActuator};
use robogo::camera::Camera;
use robogo::narration::TranscriptNarrator;
use robogo::pursuit::{PursuitConfig, PursuitDriver, PursuitError};
use robogo::vision::{Frame, RetryPolicy, RetryingModel, VisionError, VisionModel};

const NOT_VISIBLE: &str = "1. GOAL VISIBLE: No\n\
2. GOAL DIRECTION: Not Visible\n\
3. GOAL PROXIMITY: Not Visible\n\
4. PATH STATUS: Clear\n\
5. OBSTACLE INFO: None";

const REACHED: &str = "1. GOAL VISIBLE: Yes\n\
2. GOAL DIRECTION: Center\n\
3. GOAL PROXIMITY: Reachable\n\
4. PATH STATUS: Clear\n\
5. OBSTACLE INFO: None";

const FAR_LEFT: &str = "GOAL VISIBLE: Yes\n\
GOAL DIRECTION: Far Left\n\
GOAL PROXIMITY: Far\n\
PATH STATUS: Clear\n\
OBSTACLE INFO: None";

/// Returns scripted frames, then blank 8x8 frames forever
#[derive(Clone, Default)]
struct ScriptedCamera {
    frames: Arc<Mutex<VecDeque<Option<Frame>>>>,
    fallback_empty: bool,
    captures: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
}

impl ScriptedCamera {
    fn new(frames: Vec<Option<Frame>>) -> Self {
        Self {
            frames: Arc::new(Mutex::new(frames.into())),
            ..Self::default()
        }
    }

    fn broken() -> Self {
        Self {
            fallback_empty: true,
            ..Self::default()
        }
    }

    fn captures(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for ScriptedCamera {
    async fn start(&mut self) {}

    async fn capture(&mut self) -> Option<Frame> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        match self.frames.lock().unwrap().pop_front() {
            Some(frame) => frame,
            None if self.fallback_empty => None,
            None => Some(Frame::blank(8, 8)),
        }
    }

    async fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Returns scripted replies, then `default` forever
#[derive(Clone)]
struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Result<Option<String>, VisionError>>>>,
    default: String,
    calls: Arc<AtomicU32>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<Option<String>, VisionError>>, default: &str) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            default: default.to_string(),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    fn always(text: &str) -> Self {
        Self::new(Vec::new(), text)
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn ask(&self, _frame: &Frame, _prompt: &str) -> Result<Option<String>, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(self.default.clone())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn advice(text: &str) -> Result<Option<String>, VisionError> {
    Ok(Some(text.to_string()))
}

struct Harness {
    driver: PursuitDriver,
    camera: ScriptedCamera,
    model: ScriptedModel,
    motors: MotorLog,
    narrator: TranscriptNarrator,
}

fn harness(camera: ScriptedCamera, model: ScriptedModel, config: PursuitConfig) -> Harness {
    let actuator = SimulatedActuator::new();
    let motors = actuator.log();
    let narrator = TranscriptNarrator::new();
    let driver = PursuitDriver::new(
        Box::new(camera.clone()),
        Box::new(model.clone()),
        Arc::new(narrator.clone()),
        Box::new(actuator),
        config,
    );
    Harness {
        driver,
        camera,
        model,
        motors,
        narrator,
    }
}

fn test_config() -> PursuitConfig {
    PursuitConfig {
        seed: Some(42),
        ..PursuitConfig::without_pauses()
    }
}

fn ends_stopped(motors: &MotorLog) -> bool {
    matches!(motors.events().last(), Some(MotorEvent::Stop))
}

/// A goal that never appears exhausts exactly the step budget
#[tokio::test]
async fn test_never_visible_exhausts_budget() {
    let mut h = harness(
        ScriptedCamera::default(),
        ScriptedModel::always(NOT_VISIBLE),
        test_config(),
    );

    let report = h.driver.pursue("red ball").await.unwrap();

    assert!(!report.reached);
    assert_eq!(report.steps_completed, 40);
    assert_eq!(h.model.calls(), 40);
    assert_eq!(h.camera.captures(), 40);
    assert!(ends_stopped(&h.motors));
    assert!(h.narrator.heard("Okay, I will look for the red ball."));
    assert!(h
        .narrator
        .heard("Maximum steps reached. I could not definitively reach the red ball."));
    assert!(!report.trace_id.is_empty());
}

/// Every unseen step turns; the third in a row is a scan and resets the counter
#[tokio::test]
async fn test_never_visible_turns_every_step() {
    let mut h = harness(
        ScriptedCamera::default(),
        ScriptedModel::always(NOT_VISIBLE),
        test_config(),
    );

    h.driver.pursue_for("cup", 6).await.unwrap();

    let moves = h.motors.moves();
    assert_eq!(moves.len(), 6);
    assert!(moves.iter().all(|(direction, _)| direction.is_turn()));
    assert_eq!(moves[2].1, Duration::from_millis(600));
    assert_eq!(moves[5].1, Duration::from_millis(600));
    assert!(h.narrator.heard("Goal lost. Scanning."));
}

/// Success on step 5 ends the pursuit with no further perception
#[tokio::test]
async fn test_reached_on_fifth_step_stops_immediately() {
    let model = ScriptedModel::new(
        vec![
            advice(NOT_VISIBLE),
            advice(NOT_VISIBLE),
            advice(NOT_VISIBLE),
            advice(NOT_VISIBLE),
            advice(REACHED),
        ],
        NOT_VISIBLE,
    );
    let mut h = harness(ScriptedCamera::default(), model, test_config());

    let report = h.driver.pursue("red ball").await.unwrap();

    assert!(report.reached);
    assert_eq!(report.steps_completed, 5);
    assert_eq!(h.model.calls(), 5);
    assert_eq!(h.camera.captures(), 5);
    assert!(ends_stopped(&h.motors));
    assert!(h.narrator.heard("I have reached the red ball! Pursuit successful."));
    assert!(!h.narrator.heard("Maximum steps reached"));
}

/// Missing and zero-sized frames are retried without consuming a step
#[tokio::test]
async fn test_empty_frames_do_not_consume_steps() {
    let camera = ScriptedCamera::new(vec![
        None,
        Some(Frame::blank(0, 0)),
        Some(Frame::blank(8, 8)),
        None,
        Some(Frame::blank(8, 8)),
        Some(Frame::blank(8, 8)),
    ]);
    let mut h = harness(camera, ScriptedModel::always(NOT_VISIBLE), test_config());

    let report = h.driver.pursue_for("cup", 3).await.unwrap();

    assert_eq!(report.steps_completed, 3);
    assert_eq!(report.capture_failures, 3);
    assert_eq!(h.camera.captures(), 6);
    assert_eq!(h.model.calls(), 3);
    assert!(h
        .narrator
        .heard("I couldn't get an image from the camera for this step."));
}

/// A camera that never delivers aborts instead of spinning forever
#[tokio::test]
async fn test_dead_camera_aborts() {
    let config = PursuitConfig {
        max_consecutive_capture_failures: 5,
        ..test_config()
    };
    let mut h = harness(ScriptedCamera::broken(), ScriptedModel::always(NOT_VISIBLE), config);

    let result = h.driver.pursue("cup").await;

    assert!(matches!(result, Err(PursuitError::CameraUnavailable(5))));
    assert_eq!(h.camera.captures(), 5);
    assert_eq!(h.model.calls(), 0);
    assert!(ends_stopped(&h.motors));
}

/// A zero failure limit keeps retrying the camera instead of aborting
#[tokio::test]
async fn test_zero_capture_limit_never_aborts() {
    let mut frames = vec![None; 15];
    frames.push(Some(Frame::blank(8, 8)));
    let config = PursuitConfig {
        max_consecutive_capture_failures: 0,
        ..test_config()
    };
    let mut h = harness(
        ScriptedCamera::new(frames),
        ScriptedModel::always(NOT_VISIBLE),
        config,
    );

    let report = h.driver.pursue_for("cup", 1).await.unwrap();

    assert_eq!(report.steps_completed, 1);
    assert_eq!(report.capture_failures, 15);
    assert_eq!(h.model.calls(), 1);
}

/// The credentials failure is announced once, even through the retry wrapper
#[tokio::test]
async fn test_unauthorized_narrated_once() {
    let scripted = ScriptedModel::new(
        vec![Err(VisionError::Unauthorized("API key not valid".to_string()))],
        NOT_VISIBLE,
    );
    let actuator = SimulatedActuator::new();
    let motors = actuator.log();
    let narrator = TranscriptNarrator::new();
    let model = RetryingModel::new(
        scripted.clone(),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        },
        Arc::new(narrator.clone()),
    );
    let mut driver = PursuitDriver::new(
        Box::new(ScriptedCamera::default()),
        Box::new(model),
        Arc::new(narrator.clone()),
        Box::new(actuator),
        test_config(),
    );

    assert!(matches!(
        driver.pursue("cup").await,
        Err(PursuitError::Vision(_))
    ));

    let announcements = narrator
        .lines()
        .iter()
        .filter(|line| line.contains("authentication error"))
        .count();
    assert_eq!(announcements, 1);
    assert_eq!(narrator.lines().last().map(String::as_str), Some(
        "My connection to the vision system failed due to an authentication error. Please check the API key."
    ));
    assert_eq!(scripted.calls(), 1);
    assert!(ends_stopped(&motors));
}

/// An authentication failure aborts the pursuit and leaves motors stopped
#[tokio::test]
async fn test_unauthorized_aborts_and_stops() {
    let model = ScriptedModel::new(
        vec![
            advice(NOT_VISIBLE),
            Err(VisionError::Unauthorized("API key not valid".to_string())),
        ],
        NOT_VISIBLE,
    );
    let mut h = harness(ScriptedCamera::default(), model, test_config());

    let result = h.driver.pursue("cup").await;

    match result {
        Err(PursuitError::Vision(e)) => assert!(e.is_fatal()),
        other => panic!("expected vision failure, got {:?}", other.map(|r| r.reached)),
    }
    assert_eq!(h.model.calls(), 2);
    assert!(ends_stopped(&h.motors));
}

/// No advice consumes the step with a half-second random turn
#[tokio::test]
async fn test_missing_advice_turns_and_continues() {
    let model = ScriptedModel::new(
        vec![
            Ok(None),
            Err(VisionError::EmptyResponse),
            advice(REACHED),
        ],
        NOT_VISIBLE,
    );
    let mut h = harness(ScriptedCamera::default(), model, test_config());

    let report = h.driver.pursue("cup").await.unwrap();

    assert!(report.reached);
    assert_eq!(report.steps_completed, 3);
    assert_eq!(report.advice_failures, 2);

    let moves = h.motors.moves();
    for (direction, duration) in &moves[..2] {
        assert!(direction.is_turn());
        assert_eq!(*duration, Duration::from_millis(500));
    }
    assert!(h
        .narrator
        .heard("I could not get navigation advice for this view. I will try turning."));
}

/// At most two re-centring turns per pursuit, however long it runs
#[tokio::test]
async fn test_corrections_capped_per_pursuit() {
    let mut h = harness(
        ScriptedCamera::default(),
        ScriptedModel::always(FAR_LEFT),
        test_config(),
    );

    let report = h.driver.pursue_for("chair", 8).await.unwrap();

    assert_eq!(report.final_state.correction_count, 2);
    let lefts = h
        .motors
        .moves()
        .iter()
        .filter(|(direction, _)| *direction == Direction::Left)
        .count();
    assert_eq!(lefts, 2);
    let forwards = h
        .motors
        .moves()
        .iter()
        .filter(|(direction, _)| *direction == Direction::Forward)
        .count();
    assert_eq!(forwards, 8);
}

/// Unlabelled advice is treated as goal not visible and narrated as such
#[tokio::test]
async fn test_unlabelled_advice_falls_back_to_not_visible() {
    let mut h = harness(
        ScriptedCamera::default(),
        ScriptedModel::always("I think there is a ball somewhere."),
        test_config(),
    );

    let report = h.driver.pursue_for("ball", 2).await.unwrap();

    assert!(!report.reached);
    assert_eq!(report.final_state.lost_goal_counter, 2);
    assert!(h.narrator.heard("Goal is not visible."));
}

/// Same seed, same advice, same motor commands
#[tokio::test]
async fn test_seeded_runs_are_reproducible() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut h = harness(
            ScriptedCamera::default(),
            ScriptedModel::always(NOT_VISIBLE),
            PursuitConfig {
                seed: Some(7),
                ..PursuitConfig::without_pauses()
            },
        );
        h.driver.pursue_for("cup", 10).await.unwrap();
        runs.push(h.motors.moves());
    }
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_empty_goal_rejected() {
    let mut h = harness(
        ScriptedCamera::default(),
        ScriptedModel::always(NOT_VISIBLE),
        test_config(),
    );

    assert!(matches!(
        h.driver.pursue("   ").await,
        Err(PursuitError::EmptyGoal)
    ));
    assert_eq!(h.camera.captures(), 0);
}

/// The opening survey speaks the model's description
#[tokio::test]
async fn test_survey_scene_narrates_description() {
    let description = "I see the following elements: a red ball, a blue box.";
    let mut h = harness(
        ScriptedCamera::default(),
        ScriptedModel::always(description),
        test_config(),
    );

    let spoken = h.driver.survey_scene().await.unwrap();

    assert_eq!(spoken.as_deref(), Some(description));
    assert!(h.narrator.heard("a blue box"));
}

#[tokio::test]
async fn test_survey_without_frame_is_not_an_error() {
    let mut h = harness(
        ScriptedCamera::broken(),
        ScriptedModel::always(NOT_VISIBLE),
        test_config(),
    );

    assert!(h.driver.survey_scene().await.unwrap().is_none());
    assert!(h.narrator.heard("couldn't get an initial image"));
    assert_eq!(h.model.calls(), 0);
}

/// Shutdown stops both collaborators and can be repeated
#[tokio::test]
async fn test_shutdown_is_repeatable() {
    let mut h = harness(
        ScriptedCamera::default(),
        ScriptedModel::always(NOT_VISIBLE),
        test_config(),
    );

    h.driver.shutdown().await;
    h.driver.shutdown().await;

    assert_eq!(h.motors.stop_count(), 2);
    assert_eq!(h.camera.stops.load(Ordering::SeqCst), 2);
}
