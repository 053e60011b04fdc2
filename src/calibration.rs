//! Robot calibration settings
//!
//! Typed motor, recognition and duration parameters persisted as a
//! two-level JSON document (`category -> key -> number`).

use crate::error::{RoboError, RoboResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

pub const MOTOR_SPEED: &str = "motor_speed";
pub const VOICE_RECOGNITION: &str = "voice_recognition";
pub const MOVEMENT_DURATION: &str = "movement_duration";

/// Every calibration value the robot and dispatcher know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    ForwardSpeed,
    BackwardSpeed,
    TurnSpeed,
    StrafeSpeed,
    ConfidenceThreshold,
    VolumeThreshold,
    DefaultDuration,
    TurnDuration,
}

impl Setting {
    pub const ALL: [Setting; 8] = [
        Setting::ForwardSpeed,
        Setting::BackwardSpeed,
        Setting::TurnSpeed,
        Setting::StrafeSpeed,
        Setting::ConfidenceThreshold,
        Setting::VolumeThreshold,
        Setting::DefaultDuration,
        Setting::TurnDuration,
    ];

    pub fn category(&self) -> &'static str {
        match self {
            Setting::ForwardSpeed
            | Setting::BackwardSpeed
            | Setting::TurnSpeed
            | Setting::StrafeSpeed => MOTOR_SPEED,
            Setting::ConfidenceThreshold | Setting::VolumeThreshold => VOICE_RECOGNITION,
            Setting::DefaultDuration | Setting::TurnDuration => MOVEMENT_DURATION,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Setting::ForwardSpeed => "forward",
            Setting::BackwardSpeed => "backward",
            Setting::TurnSpeed => "turn_speed",
            Setting::StrafeSpeed => "strafe_speed",
            Setting::ConfidenceThreshold => "confidence_threshold",
            Setting::VolumeThreshold => "volume_threshold",
            Setting::DefaultDuration => "default_duration",
            Setting::TurnDuration => "turn_duration",
        }
    }

    /// Resolve a (category, key) pair to a known setting
    pub fn lookup(category: &str, key: &str) -> Option<Setting> {
        Setting::ALL
            .into_iter()
            .find(|s| s.category() == category && s.key() == key)
    }

    /// Inclusive range a value must fall in
    pub fn range(&self) -> (f64, f64) {
        match self.category() {
            MOTOR_SPEED => (0.0, 100.0),
            VOICE_RECOGNITION => (0.0, 1.0),
            _ => (0.0, 60.0),
        }
    }

    fn validate(&self, value: f64) -> RoboResult<()> {
        let (min, max) = self.range();
        if !value.is_finite() || value < min || value > max {
            return Err(RoboError::Calibration(format!(
                "{} must be between {} and {}, got {}",
                self, min, max, value
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category(), self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorSpeed {
    pub forward: f64,
    pub backward: f64,
    pub turn_speed: f64,
    pub strafe_speed: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl Default for MotorSpeed {
    fn default() -> Self {
        Self {
            forward: 50.0,
            backward: 50.0,
            turn_speed: 40.0,
            strafe_speed: 45.0,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceRecognition {
    pub confidence_threshold: f64,
    pub volume_threshold: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl Default for VoiceRecognition {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            volume_threshold: 0.3,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementDuration {
    pub default_duration: f64,
    pub turn_duration: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl Default for MovementDuration {
    fn default() -> Self {
        Self {
            default_duration: 1.0,
            turn_duration: 0.5,
            extra: BTreeMap::new(),
        }
    }
}

/// The full calibration document.
///
/// Known keys are typed fields; anything else the file carries is kept in
/// the `extra` maps so it survives a save.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    pub motor_speed: MotorSpeed,
    pub voice_recognition: VoiceRecognition,
    pub movement_duration: MovementDuration,
    #[serde(flatten)]
    pub extra: BTreeMap<String, BTreeMap<String, f64>>,
}

impl CalibrationSettings {
    /// Load settings from disk, falling back to defaults when the file is
    /// missing, unreadable, malformed, or out of range.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("📐 No calibration at {}, using defaults", path.display());
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(RoboError::from)
            .and_then(|content| Ok(serde_json::from_str::<Self>(&content)?))
            .and_then(|settings| settings.validate().map(|_| settings));

        match parsed {
            Ok(settings) => {
                info!("📐 Loaded calibration from {}", path.display());
                settings
            }
            Err(e) => {
                warn!(
                    "⚠️ Calibration file {} invalid, using defaults: {}",
                    path.display(),
                    e
                );
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Self::default()
            }
        }
    }

    /// Check every known value against its range and every extra value for finiteness
    pub fn validate(&self) -> RoboResult<()> {
        for setting in Setting::ALL {
            setting.validate(self.get_setting(setting))?;
        }
        let extras = [
            (MOTOR_SPEED, &self.motor_speed.extra),
            (VOICE_RECOGNITION, &self.voice_recognition.extra),
            (MOVEMENT_DURATION, &self.movement_duration.extra),
        ]
        .into_iter()
        .chain(self.extra.iter().map(|(c, keys)| (c.as_str(), keys)));

        for (category, keys) in extras {
            if let Some((key, value)) = keys.iter().find(|(_, v)| !v.is_finite()) {
                return Err(RoboError::Calibration(format!(
                    "{}.{} is not a finite number: {}",
                    category, key, value
                )));
            }
        }
        Ok(())
    }

    pub fn get_setting(&self, setting: Setting) -> f64 {
        match setting {
            Setting::ForwardSpeed => self.motor_speed.forward,
            Setting::BackwardSpeed => self.motor_speed.backward,
            Setting::TurnSpeed => self.motor_speed.turn_speed,
            Setting::StrafeSpeed => self.motor_speed.strafe_speed,
            Setting::ConfidenceThreshold => self.voice_recognition.confidence_threshold,
            Setting::VolumeThreshold => self.voice_recognition.volume_threshold,
            Setting::DefaultDuration => self.movement_duration.default_duration,
            Setting::TurnDuration => self.movement_duration.turn_duration,
        }
    }

    fn slot_mut(&mut self, setting: Setting) -> &mut f64 {
        match setting {
            Setting::ForwardSpeed => &mut self.motor_speed.forward,
            Setting::BackwardSpeed => &mut self.motor_speed.backward,
            Setting::TurnSpeed => &mut self.motor_speed.turn_speed,
            Setting::StrafeSpeed => &mut self.motor_speed.strafe_speed,
            Setting::ConfidenceThreshold => &mut self.voice_recognition.confidence_threshold,
            Setting::VolumeThreshold => &mut self.voice_recognition.volume_threshold,
            Setting::DefaultDuration => &mut self.movement_duration.default_duration,
            Setting::TurnDuration => &mut self.movement_duration.turn_duration,
        }
    }

    fn extra_map(&self, category: &str) -> Option<&BTreeMap<String, f64>> {
        match category {
            MOTOR_SPEED => Some(&self.motor_speed.extra),
            VOICE_RECOGNITION => Some(&self.voice_recognition.extra),
            MOVEMENT_DURATION => Some(&self.movement_duration.extra),
            other => self.extra.get(other),
        }
    }

    fn extra_map_mut(&mut self, category: &str) -> &mut BTreeMap<String, f64> {
        match category {
            MOTOR_SPEED => &mut self.motor_speed.extra,
            VOICE_RECOGNITION => &mut self.voice_recognition.extra,
            MOVEMENT_DURATION => &mut self.movement_duration.extra,
            other => self.extra.entry(other.to_string()).or_default(),
        }
    }

    /// Value for (category, key), or 0 when either is unknown
    pub fn get(&self, category: &str, key: &str) -> f64 {
        match Setting::lookup(category, key) {
            Some(setting) => self.get_setting(setting),
            None => self
                .extra_map(category)
                .and_then(|keys| keys.get(key))
                .copied()
                .unwrap_or(0.0),
        }
    }

    pub fn set_setting(&mut self, setting: Setting, value: f64) -> RoboResult<()> {
        setting.validate(value)?;
        *self.slot_mut(setting) = value;
        Ok(())
    }

    /// Insert or overwrite (category, key), creating the category if needed
    pub fn set(&mut self, category: &str, key: &str, value: f64) -> RoboResult<()> {
        match Setting::lookup(category, key) {
            Some(setting) => self.set_setting(setting, value),
            None => {
                if category.is_empty() || key.is_empty() {
                    return Err(RoboError::Calibration(
                        "Category and key must be non-empty".to_string(),
                    ));
                }
                if !value.is_finite() {
                    return Err(RoboError::Calibration(format!(
                        "{}.{} must be a finite number",
                        category, key
                    )));
                }
                self.extra_map_mut(category).insert(key.to_string(), value);
                Ok(())
            }
        }
    }
}

/// Shared owner of the calibration settings and their backing file.
///
/// Readers take short read locks; nothing holds a lock across I/O on the
/// audio path.
#[derive(Debug)]
pub struct CalibrationStore {
    path: PathBuf,
    settings: RwLock<CalibrationSettings>,
}

impl CalibrationStore {
    /// Open the store, loading the file at `path` or defaults
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = CalibrationSettings::load(&path);
        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, CalibrationSettings> {
        self.settings.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CalibrationSettings> {
        self.settings.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Value for (category, key), or 0 when either is unknown
    pub fn get(&self, category: &str, key: &str) -> f64 {
        self.read().get(category, key)
    }

    pub fn get_setting(&self, setting: Setting) -> f64 {
        self.read().get_setting(setting)
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> CalibrationSettings {
        self.read().clone()
    }

    /// In-memory update; call [`save`](Self::save) to persist
    pub fn set(&self, category: &str, key: &str, value: f64) -> RoboResult<()> {
        self.write().set(category, key, value)
    }

    pub fn set_setting(&self, setting: Setting, value: f64) -> RoboResult<()> {
        self.write().set_setting(setting, value)
    }

    /// Persist the current settings. Failure is logged and returned.
    pub fn save(&self) -> RoboResult<()> {
        let content = serde_json::to_string_pretty(&*self.read())?;

        let result = (|| -> RoboResult<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, content)?;
            Ok(())
        })();

        match &result {
            Ok(()) => info!("💾 Calibration saved to {}", self.path.display()),
            Err(e) => warn!(
                "❌ Failed to save calibration to {}: {}",
                self.path.display(),
                e
            ),
        }
        result
    }

    /// Replace every setting with the defaults and persist immediately
    pub fn reset_to_defaults(&self) -> RoboResult<()> {
        *self.write() = CalibrationSettings::default();
        info!("↩️ Calibration reset to defaults");
        self.save()
    }
}
