//! RoboVoice Library
//!
//! Core modules for the RoboVoice robot voice control front end.

pub mod asr;
pub mod audio;
pub mod audit;
pub mod calibration;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod robot;
pub mod utils;

pub use calibration::{CalibrationSettings, CalibrationStore, Setting};
pub use commands::{Command, KeywordGrammar};
pub use dispatcher::{CommandDispatcher, DispatchEvent, EventSink, ListenOptions, ListenState};
pub use error::{RoboError, RoboResult};
pub use robot::{RobotController, RobotDriver};
