//! Motor controller driven through a device node
//!
//! The controller board accepts one text command per line:
//!
//! ```text
//! forward 70
//! left 70
//! stop
//! ```
//!
//! A move is "command, wait for the duration, stop", so each `drive` call
//! leaves the wheels stopped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::{Actuator, ActuatorError, Direction};
use crate::metrics::MOTOR_COMMANDS;

/// Default motor power (percent)
pub const DEFAULT_POWER: u8 = 70;

/// Actuator writing commands to a motor-controller device
pub struct DeviceActuator {
    path: PathBuf,
    device: File,
    power: u8,
}

impl DeviceActuator {
    /// Open the device node for writing
    ///
    /// Failure here is a setup error: the pursuit must not start without motors.
    pub async fn open(path: impl AsRef<Path>, power: u8) -> Result<Self, ActuatorError> {
        let path = path.as_ref().to_path_buf();
        let device = OpenOptions::new()
            .write(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| ActuatorError::Open {
                path: path.display().to_string(),
                source,
            })?;

        info!(device = %path.display(), power, "Motor controller opened");
        Ok(Self {
            path,
            device,
            power: power.min(100),
        })
    }

    async fn send(&mut self, command: &str) {
        let line = format!("{}\n", command);
        let result = async {
            self.device.write_all(line.as_bytes()).await?;
            self.device.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(device = %self.path.display(), command, error = %e, "Motor command failed");
        }
    }
}

#[async_trait]
impl Actuator for DeviceActuator {
    async fn drive(&mut self, direction: Direction, duration: Duration) {
        MOTOR_COMMANDS.with_label_values(&[direction.as_str()]).inc();

        if direction != Direction::None {
            info!(direction = %direction, duration_s = duration.as_secs_f64(), "Moving");
            let command = format!("{} {}", direction.as_str(), self.power);
            self.send(&command).await;
        }

        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        self.send("stop").await;
    }

    async fn stop(&mut self) {
        MOTOR_COMMANDS.with_label_values(&["stop"]).inc();
        info!("Stopping motors");
        self.send("stop").await;
    }

    fn name(&self) -> &str {
        "device"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_command_then_stop() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut actuator = DeviceActuator::open(file.path(), DEFAULT_POWER).await.unwrap();

        actuator.drive(Direction::Right, Duration::ZERO).await;
        actuator.drive(Direction::Forward, Duration::ZERO).await;
        actuator.stop().await;

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "right 70\nstop\nforward 70\nstop\nstop\n");
    }

    #[tokio::test]
    async fn test_none_direction_only_stops() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut actuator = DeviceActuator::open(file.path(), 40).await.unwrap();

        actuator.drive(Direction::None, Duration::ZERO).await;

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "stop\n");
    }

    #[tokio::test]
    async fn test_power_is_clamped() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut actuator = DeviceActuator::open(file.path(), 250).await.unwrap();
        actuator.drive(Direction::Backward, Duration::ZERO).await;

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert!(written.starts_with("backward 100\n"));
    }

    #[tokio::test]
    async fn test_missing_device_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("motors");
        let err = DeviceActuator::open(&missing, DEFAULT_POWER).await.err().unwrap();
        assert!(err.to_string().contains("failed to open motor device"));
    }
}
