//! RoboVoice Error Types
//!
//! Centralized error handling for the voice control pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Central error type for RoboVoice
#[derive(Error, Debug)]
pub enum RoboError {
    #[error("Vosk model not found at {} (download one from https://alphacephei.com/vosk/models)", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Speech model error: {0}")]
    Model(String),

    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Audio capture error: {0}")]
    Audio(String),

    #[error("Audio stream closed: {0}")]
    AudioClosed(String),

    #[error("Calibration error: {0}")]
    Calibration(String),

    #[error("Keyword grammar error: {0}")]
    Grammar(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Robot driver error: {0}")]
    Robot(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RoboVoice operations
pub type RoboResult<T> = Result<T, RoboError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for RoboError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        RoboError::Lock(err.to_string())
    }
}
