use crate::commands::Command;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Smallest and largest audio frame the listen loop reads at once
pub const MIN_FRAME_SIZE: usize = 4096;
pub const MAX_FRAME_SIZE: usize = 8192;

/// Shortest wait for audio per read; zero would busy-loop the listen thread
pub const MIN_READ_TIMEOUT_MS: u64 = 10;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Speech
    /// Model directory; empty means search the standard locations
    pub vosk_model_path: String,
    pub wake_word: String,
    pub wake_window_secs: u64,
    pub extra_synonyms: BTreeMap<Command, Vec<String>>,

    // Audio
    pub audio_device: Option<usize>,
    pub frame_size: usize,
    pub read_timeout_ms: u64,
    pub stop_timeout_ms: u64,

    // Robot
    pub calibration_path: String,
    pub action_log: bool,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vosk_model_path: String::new(),
            wake_word: String::new(),
            wake_window_secs: 5,
            extra_synonyms: BTreeMap::new(),
            audio_device: None,
            frame_size: MIN_FRAME_SIZE,
            read_timeout_ms: 500,
            stop_timeout_ms: 1000,
            calibration_path: config_dir()
                .join("robot_calibration.json")
                .to_string_lossy()
                .to_string(),
            action_log: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from `path`. A corrupt file is backed up and replaced by defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: log warning and use defaults
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Frame size clamped to the supported range
    pub fn effective_frame_size(&self) -> usize {
        self.frame_size.clamp(MIN_FRAME_SIZE, MAX_FRAME_SIZE)
    }

    /// Per-read audio wait, never below [`MIN_READ_TIMEOUT_MS`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(MIN_READ_TIMEOUT_MS))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn wake_window(&self) -> Duration {
        Duration::from_secs(self.wake_window_secs)
    }

    pub fn action_log_path(&self) -> PathBuf {
        config_dir().join("robot_actions.log")
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("robovoice")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}
