//! Simulated motors for running off-robot

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{Actuator, Direction};
use crate::metrics::MOTOR_COMMANDS;

/// One command received by a [`SimulatedActuator`]
#[derive(Debug, Clone, PartialEq)]
pub enum MotorEvent {
    Drive { direction: Direction, duration: Duration },
    Stop,
}

/// Shared, cloneable record of every command sent to a simulated actuator
///
/// The driver owns the actuator for the whole pursuit, so callers keep a
/// clone of the log to inspect what happened.
#[derive(Debug, Clone, Default)]
pub struct MotorLog {
    events: Arc<Mutex<Vec<MotorEvent>>>,
}

impl MotorLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: MotorEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Snapshot of all events so far, oldest first
    pub fn events(&self) -> Vec<MotorEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Only the timed moves, in order
    pub fn moves(&self) -> Vec<(Direction, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MotorEvent::Drive { direction, duration } => Some((direction, duration)),
                MotorEvent::Stop => None,
            })
            .collect()
    }

    /// Number of explicit `stop()` calls
    pub fn stop_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MotorEvent::Stop))
            .count()
    }
}

/// Actuator that only logs and records what it was asked to do
pub struct SimulatedActuator {
    log: MotorLog,
    /// Sleep for the commanded duration, like real motors would
    realtime: bool,
}

impl SimulatedActuator {
    /// Create a simulated actuator that returns immediately from every move
    pub fn new() -> Self {
        Self {
            log: MotorLog::new(),
            realtime: false,
        }
    }

    /// Create a simulated actuator that blocks for each move's duration
    pub fn realtime() -> Self {
        Self {
            log: MotorLog::new(),
            realtime: true,
        }
    }

    /// Handle to the command log; stays valid after the actuator is moved
    pub fn log(&self) -> MotorLog {
        self.log.clone()
    }
}

impl Default for SimulatedActuator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Actuator for SimulatedActuator {
    async fn drive(&mut self, direction: Direction, duration: Duration) {
        info!(
            direction = %direction,
            duration_s = duration.as_secs_f64(),
            "[SIM MOTOR] move"
        );
        MOTOR_COMMANDS.with_label_values(&[direction.as_str()]).inc();
        self.log.push(MotorEvent::Drive { direction, duration });

        if self.realtime && !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    async fn stop(&mut self) {
        info!("[SIM MOTOR] stop");
        MOTOR_COMMANDS.with_label_values(&["stop"]).inc();
        self.log.push(MotorEvent::Stop);
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_moves_and_stops() {
        let mut actuator = SimulatedActuator::new();
        let log = actuator.log();

        actuator.drive(Direction::Left, Duration::from_millis(150)).await;
        actuator.drive(Direction::Forward, Duration::from_secs(2)).await;
        actuator.stop().await;

        assert_eq!(
            log.moves(),
            vec![
                (Direction::Left, Duration::from_millis(150)),
                (Direction::Forward, Duration::from_secs(2)),
            ]
        );
        assert_eq!(log.stop_count(), 1);
        assert_eq!(log.events().len(), 3);
    }

    #[tokio::test]
    async fn test_stop_without_moves_is_safe() {
        let mut actuator = SimulatedActuator::default();
        let log = actuator.log();
        actuator.stop().await;
        actuator.stop().await;
        assert_eq!(log.stop_count(), 2);
        assert!(log.moves().is_empty());
    }
}
