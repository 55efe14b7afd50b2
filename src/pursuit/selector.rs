//! Action selection: observation + counters → timed moves
//!
//! Two macro-states are re-evaluated from scratch every step:
//!
//! ```text
//!                 goal_visible = false                 goal_visible = true
//!  ┌──────────────────────────────────────┐  ┌──────────────────────────────────────┐
//!  │ lost += 1                            │  │ lost = 0                             │
//!  │ lost == 3        → scan turn, lost=0 │  │ corrections < 2  → re-centre turn    │
//!  │ blocked / major  → turn, blocked += 1│  │ minor obstacle   → small dodge       │
//!  │ minor obstacle   → short turn        │  │ blocked / major  → push or reorient  │
//!  │ clear            → exploration turn  │  │ clear            → drive forward     │
//!  └──────────────────────────────────────┘  │ reachable / very close → SUCCESS     │
//!                                            └──────────────────────────────────────┘
//! ```
//!
//! When neither branch moved the robot (after the first step) a small
//! uncertain turn is issued instead. Left/right choices with no preferred
//! side are drawn from the caller's RNG.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use super::observation::{GoalDirection, Observation, PathStatus};
use crate::actuator::Direction;

/// Consecutive unseen steps before a wide scan
pub const LOST_GOAL_THRESHOLD: u32 = 3;

/// Re-centring turns allowed per pursuit
pub const MAX_CORRECTIONS: u32 = 2;

const SCAN_TURN: Duration = Duration::from_millis(600);
const BLOCKED_TURN: Duration = Duration::from_millis(500);
const AVOID_TURN: Duration = Duration::from_millis(350);
const EXPLORE_TURN: Duration = Duration::from_millis(500);
const SLIGHT_CORRECTION: Duration = Duration::from_millis(150);
const WIDE_CORRECTION: Duration = Duration::from_millis(450);
const DODGE_TURN: Duration = Duration::from_millis(150);
const REORIENT_TURN: Duration = Duration::from_millis(600);
const UNCERTAIN_TURN: Duration = Duration::from_millis(200);

/// Counters carried across the steps of one pursuit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PursuitState {
    pub goal_object: String,
    /// Index of the step being decided, starting at 0
    pub step: u32,
    pub lost_goal_counter: u32,
    pub consecutive_blocked_counter: u32,
    /// Re-centring turns used so far; never exceeds the correction budget
    pub correction_count: u32,
}

impl PursuitState {
    pub fn new(goal_object: impl Into<String>) -> Self {
        Self {
            goal_object: goal_object.into(),
            step: 0,
            lost_goal_counter: 0,
            consecutive_blocked_counter: 0,
            correction_count: 0,
        }
    }
}

/// One timed move
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Move {
    pub direction: Direction,
    pub duration: Duration,
}

impl Move {
    pub fn new(direction: Direction, duration: Duration) -> Self {
        Self { direction, duration }
    }
}

/// What the step concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// Nothing was decided; the plan is empty
    #[default]
    None,
    /// Moves were planned; keep pursuing
    Continue,
    /// The goal is reached
    Success,
}

/// Moves to apply this step, in order, plus remarks to narrate first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionPlan {
    pub moves: Vec<Move>,
    pub terminal: Terminal,
    pub remarks: Vec<String>,
}

impl ActionPlan {
    fn push(&mut self, direction: Direction, duration: Duration) {
        self.moves.push(Move::new(direction, duration));
    }

    fn remark(&mut self, text: impl Into<String>) {
        self.remarks.push(text.into());
    }

    pub fn is_success(&self) -> bool {
        self.terminal == Terminal::Success
    }
}

/// Maps observations to plans
#[derive(Debug, Clone)]
pub struct ActionSelector {
    pub lost_goal_threshold: u32,
    pub max_corrections: u32,
}

impl Default for ActionSelector {
    fn default() -> Self {
        Self {
            lost_goal_threshold: LOST_GOAL_THRESHOLD,
            max_corrections: MAX_CORRECTIONS,
        }
    }
}

fn random_turn<R: Rng + ?Sized>(rng: &mut R) -> Direction {
    if rng.gen_bool(0.5) {
        Direction::Left
    } else {
        Direction::Right
    }
}

impl ActionSelector {
    pub fn new(lost_goal_threshold: u32, max_corrections: u32) -> Self {
        Self {
            lost_goal_threshold: lost_goal_threshold.max(1),
            max_corrections,
        }
    }

    /// Decide this step's moves, updating the counters in `state`
    pub fn select<R: Rng + ?Sized>(
        &self,
        obs: &Observation,
        state: &mut PursuitState,
        rng: &mut R,
    ) -> ActionPlan {
        let mut plan = ActionPlan::default();

        let action_taken = if obs.goal_visible {
            let taken = self.approach(obs, state, rng, &mut plan);
            // Declared even when this step also queued a push or a turn
            if obs.goal_proximity.is_reached() {
                plan.terminal = Terminal::Success;
                return plan;
            }
            taken
        } else {
            self.search(obs, state, rng, &mut plan);
            true
        };

        if !action_taken && state.step > 0 {
            plan.remark("Uncertain. Making a small turn.");
            plan.push(random_turn(rng), UNCERTAIN_TURN);
        }

        plan.terminal = if plan.moves.is_empty() {
            Terminal::None
        } else {
            Terminal::Continue
        };
        plan
    }

    /// Goal not in view: count the miss and turn somewhere
    fn search<R: Rng + ?Sized>(
        &self,
        obs: &Observation,
        state: &mut PursuitState,
        rng: &mut R,
        plan: &mut ActionPlan,
    ) {
        state.lost_goal_counter += 1;
        plan.remark(format!("I don't see the {}.", state.goal_object));

        if state.lost_goal_counter >= self.lost_goal_threshold {
            plan.remark("Goal lost. Scanning.");
            plan.push(random_turn(rng), SCAN_TURN);
            state.lost_goal_counter = 0;
        } else if obs.path_status.is_obstructed() {
            state.consecutive_blocked_counter += 1;
            plan.remark("Blocked. Turning.");
            plan.push(random_turn(rng), BLOCKED_TURN);
        } else if obs.path_status == PathStatus::MinorObstacle {
            plan.remark("Minor obstacle ahead. Avoiding.");
            plan.push(random_turn(rng), AVOID_TURN);
        } else {
            plan.remark("Path clear but goal not visible. Exploring.");
            plan.push(random_turn(rng), EXPLORE_TURN);
        }
    }

    /// Goal in view: re-centre, then handle the path. Returns whether a
    /// path action was taken.
    fn approach<R: Rng + ?Sized>(
        &self,
        obs: &Observation,
        state: &mut PursuitState,
        rng: &mut R,
        plan: &mut ActionPlan,
    ) -> bool {
        state.lost_goal_counter = 0;

        if state.correction_count < self.max_corrections {
            let correction = match obs.goal_direction {
                GoalDirection::SlightlyLeft | GoalDirection::FarLeft => Some(Direction::Left),
                GoalDirection::SlightlyRight | GoalDirection::FarRight => Some(Direction::Right),
                _ => None,
            };
            if let Some(direction) = correction {
                let duration = if obs.goal_direction.is_slight() {
                    SLIGHT_CORRECTION
                } else {
                    WIDE_CORRECTION
                };
                plan.remark(format!(
                    "Adjusting {} toward {}.",
                    direction, state.goal_object
                ));
                plan.push(direction, duration);
                state.correction_count += 1;
            }
        }

        let forward = obs.goal_proximity.forward_duration();
        match &obs.path_status {
            PathStatus::MinorObstacle => {
                plan.remark("Minor obstacle detected. Adjusting to avoid while staying aligned.");
                plan.push(random_turn(rng), DODGE_TURN);
                true
            }
            status if status.is_obstructed() => {
                if obs.goal_proximity.is_reached() {
                    plan.remark("Goal is close. Trying to push forward gently.");
                    plan.push(Direction::Forward, forward);
                } else {
                    state.consecutive_blocked_counter += 1;
                    plan.remark("Path blocked. Reorienting.");
                    plan.push(random_turn(rng), REORIENT_TURN);
                }
                true
            }
            PathStatus::Clear => {
                plan.remark("Path is clear. Moving toward the object.");
                plan.push(Direction::Forward, forward);
                true
            }
            _ => false,
        }
    }
}

/// Decide with the default thresholds
pub fn select<R: Rng + ?Sized>(
    obs: &Observation,
    state: &mut PursuitState,
    rng: &mut R,
) -> ActionPlan {
    ActionSelector::default().select(obs, state, rng)
}
