#![allow(dead_code)]

pub mod mock_asr;
pub mod mock_audio;
pub mod mock_robot;

use mock_asr::MockRecognizers;
use mock_audio::MockAudio;
use mock_robot::MockRobot;
use robovoice::asr::Transcript;
use robovoice::{CalibrationStore, CommandDispatcher, KeywordGrammar};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A dispatcher wired to mocks, with calibration in a temp dir
pub struct TestContext {
    pub temp_dir: TempDir,
    pub recognizers: Arc<MockRecognizers>,
    pub audio: Arc<MockAudio>,
    pub robot: Arc<MockRobot>,
    pub calibration: Arc<CalibrationStore>,
}

impl TestContext {
    pub fn new(script: Vec<Transcript>) -> Self {
        Self::with_parts(MockRecognizers::new(script), MockAudio::default(), MockRobot::new())
    }

    pub fn with_parts(recognizers: MockRecognizers, audio: MockAudio, robot: MockRobot) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let calibration = Arc::new(CalibrationStore::open(
            temp_dir.path().join("robot_calibration.json"),
        ));
        Self {
            temp_dir,
            recognizers: Arc::new(recognizers),
            audio: Arc::new(audio),
            robot: Arc::new(robot),
            calibration,
        }
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(
            KeywordGrammar::movement(),
            self.recognizers.clone(),
            self.audio.clone(),
            self.robot.clone(),
            Arc::clone(&self.calibration),
        )
    }

    /// Both the audio stream and the recognizer of every session are gone
    pub fn all_released(&self) -> bool {
        self.audio.released() == self.audio.opened()
            && self.recognizers.released() == self.recognizers.created()
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
