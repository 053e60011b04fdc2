//! Robot driver seam
//!
//! The dispatcher drives the robot only through [`RobotDriver`]. The bundled
//! [`RobotController`] logs the movement it would perform with the speed and
//! duration currently in the calibration store.

use crate::calibration::{CalibrationStore, Setting};
use crate::commands::Command;
use crate::error::{RoboError, RoboResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One operation per movement command
pub trait RobotDriver: Send + Sync {
    fn forward(&self) -> RoboResult<()>;
    fn backward(&self) -> RoboResult<()>;
    fn left(&self) -> RoboResult<()>;
    fn right(&self) -> RoboResult<()>;
    fn strafe_left(&self) -> RoboResult<()>;
    fn strafe_right(&self) -> RoboResult<()>;
    fn stop(&self) -> RoboResult<()>;
}

/// A resolved movement: what the motors would be asked to do
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub command: Command,
    pub speed: f64,
    pub duration: Duration,
}

/// Placeholder driver that reports movements instead of driving motors
#[derive(Debug, Clone)]
pub struct RobotController {
    calibration: Arc<CalibrationStore>,
}

impl RobotController {
    pub fn new(calibration: Arc<CalibrationStore>) -> Self {
        info!("🤖 Initialized placeholder robot controller");
        Self { calibration }
    }

    /// Resolve speed and duration for `command` from the current calibration.
    ///
    /// Returns `None` for commands without a movement.
    pub fn plan(&self, command: Command) -> Option<Movement> {
        let (speed, duration) = match command {
            Command::Forward => (Setting::ForwardSpeed, Setting::DefaultDuration),
            Command::Backward => (Setting::BackwardSpeed, Setting::DefaultDuration),
            Command::Left | Command::Right => (Setting::TurnSpeed, Setting::TurnDuration),
            Command::StrafeLeft | Command::StrafeRight => {
                (Setting::StrafeSpeed, Setting::DefaultDuration)
            }
            Command::Stop => {
                return Some(Movement {
                    command,
                    speed: 0.0,
                    duration: Duration::ZERO,
                })
            }
            Command::Pause | Command::Resume => return None,
        };

        let seconds = self.calibration.get_setting(duration);
        Some(Movement {
            command,
            speed: self.calibration.get_setting(speed),
            duration: Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO),
        })
    }

    fn perform(&self, command: Command, label: &str) -> RoboResult<()> {
        let movement = self
            .plan(command)
            .ok_or_else(|| RoboError::Robot(format!("'{}' has no movement", command)))?;

        if command == Command::Stop {
            info!("🛑 Action: Stop");
        } else {
            info!(
                "🤖 Action: {} (speed: {}, duration: {:.2}s)",
                label,
                movement.speed,
                movement.duration.as_secs_f64()
            );
        }
        Ok(())
    }
}

impl RobotDriver for RobotController {
    fn forward(&self) -> RoboResult<()> {
        self.perform(Command::Forward, "Move forward")
    }

    fn backward(&self) -> RoboResult<()> {
        self.perform(Command::Backward, "Move backward")
    }

    fn left(&self) -> RoboResult<()> {
        self.perform(Command::Left, "Turn left")
    }

    fn right(&self) -> RoboResult<()> {
        self.perform(Command::Right, "Turn right")
    }

    fn strafe_left(&self) -> RoboResult<()> {
        self.perform(Command::StrafeLeft, "Strafe left")
    }

    fn strafe_right(&self) -> RoboResult<()> {
        self.perform(Command::StrafeRight, "Strafe right")
    }

    fn stop(&self) -> RoboResult<()> {
        self.perform(Command::Stop, "Stop")
    }
}
