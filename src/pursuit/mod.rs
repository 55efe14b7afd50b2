//! Goal pursuit: perceive, decide, act
//!
//! # Architecture
//!
//! ```text
//! Camera ──frame──▶ VisionModel ──advice text──▶ parse() ──Observation──▶ ActionSelector
//!                                                                              │
//!   Narrator ◀──────────── summary / remarks ──────────────────────────────────┤
//!   Actuator ◀──────────── moves ──────────────────────────────────────────────┘
//! ```
//!
//! [`PursuitDriver`] runs the loop. The parser and the selector are pure and
//! can be tested without any collaborator.

pub mod driver;
pub mod observation;
pub mod prompt;
pub mod selector;

pub use driver::{PursuitConfig, PursuitDriver, PursuitError, PursuitReport};
pub use observation::{
    parse, GoalDirection, GoalProximity, Observation, ParseIssue, ParsedAdvice, PathStatus,
};
pub use prompt::{navigation_prompt, NAVIGATION_PROMPT_TEMPLATE, SCENE_PROMPT};
pub use selector::{select, ActionPlan, ActionSelector, Move, PursuitState, Terminal};
