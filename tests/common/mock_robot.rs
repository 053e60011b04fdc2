//! Mock robot driver that records every operation

use robovoice::{Command, RoboError, RoboResult, RobotDriver};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockRobot {
    calls: Mutex<Vec<Command>>,
    /// Operations that fail instead of moving
    pub failing: Vec<Command>,
}

impl MockRobot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A robot whose `failing` operations return an error
    pub fn failing_on(failing: Vec<Command>) -> Self {
        Self {
            failing,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, command: Command) -> RoboResult<()> {
        self.calls.lock().unwrap().push(command);
        if self.failing.contains(&command) {
            return Err(RoboError::Robot(format!("{} motor stalled", command)));
        }
        Ok(())
    }
}

impl RobotDriver for MockRobot {
    fn forward(&self) -> RoboResult<()> {
        self.record(Command::Forward)
    }

    fn backward(&self) -> RoboResult<()> {
        self.record(Command::Backward)
    }

    fn left(&self) -> RoboResult<()> {
        self.record(Command::Left)
    }

    fn right(&self) -> RoboResult<()> {
        self.record(Command::Right)
    }

    fn strafe_left(&self) -> RoboResult<()> {
        self.record(Command::StrafeLeft)
    }

    fn strafe_right(&self) -> RoboResult<()> {
        self.record(Command::StrafeRight)
    }

    fn stop(&self) -> RoboResult<()> {
        self.record(Command::Stop)
    }
}
