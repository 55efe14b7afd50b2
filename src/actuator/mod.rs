//! Motor actuation for the robot base
//!
//! The pursuit driver never talks to motor hardware directly. It is handed an
//! [`Actuator`] once at startup and issues timed moves through it:
//!
//! ```text
//! PursuitDriver ──drive(Left, 0.15s)──► Actuator ──► motors on
//!                                          │   (blocks for the duration)
//!                                          └──► motors off
//! ```
//!
//! Two implementations are provided:
//! - [`SimulatedActuator`] - logs and records commands, used off-robot and in tests
//! - [`DeviceActuator`] - writes line commands to a motor-controller device node

pub mod device;
pub mod simulated;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use device::{DeviceActuator, DEFAULT_POWER};
pub use simulated::{MotorEvent, MotorLog, SimulatedActuator};

/// Direction of a single timed move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    /// Hold still for the duration (no motor output)
    None,
}

impl Direction {
    /// Lower-case name used in logs, metrics labels and device commands
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::None => "none",
        }
    }

    /// True for the two in-place turns
    pub fn is_turn(&self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised while setting up an actuator
///
/// Once an actuator exists its commands never fail from the caller's point
/// of view; runtime write errors are logged inside the implementation.
#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("failed to open motor device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Timed motor control
///
/// `drive` blocks for `duration` and leaves the wheels stopped afterwards.
/// `stop` is idempotent and safe to call on an actuator that never moved.
#[async_trait]
pub trait Actuator: Send {
    async fn drive(&mut self, direction: Direction, duration: Duration);

    async fn stop(&mut self);

    /// Short name for logs ("simulated", "device")
    fn name(&self) -> &str;
}
