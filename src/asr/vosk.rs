//! Offline recognition with Vosk

use super::{AsrResult, RecognizerFactory, SpeechRecognizer, Transcript};
use crate::error::{RoboError, RoboResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use vosk::{DecodingState, Model, Recognizer};

/// Model directory name used when nothing is configured
pub const DEFAULT_MODEL_NAME: &str = "vosk-model-small-en-us-0.15";

/// A loaded Vosk model, shared by every session's recognizer
#[derive(Clone)]
pub struct VoskEngine {
    model: Arc<Model>,
    model_path: PathBuf,
}

impl std::fmt::Debug for VoskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoskEngine")
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl VoskEngine {
    /// Load the model at `model_path`
    pub fn load(model_path: &Path) -> RoboResult<Self> {
        if !model_path.exists() {
            return Err(RoboError::ModelNotFound(model_path.to_path_buf()));
        }

        info!("Loading Vosk model from: {}", model_path.display());

        let model_str = model_path.to_str().ok_or_else(|| {
            RoboError::Model(format!(
                "Vosk model path is not valid UTF-8: {}",
                model_path.display()
            ))
        })?;

        let model = Model::new(model_str).ok_or_else(|| {
            RoboError::Model(format!(
                "Failed to load Vosk model from {}",
                model_path.display()
            ))
        })?;

        info!("✅ Vosk model loaded");
        Ok(Self {
            model: Arc::new(model),
            model_path: model_path.to_path_buf(),
        })
    }
}

impl RecognizerFactory for VoskEngine {
    fn create(
        &self,
        sample_rate: u32,
        vocabulary: &[String],
    ) -> RoboResult<Box<dyn SpeechRecognizer>> {
        let recognizer = if vocabulary.is_empty() {
            Recognizer::new(&self.model, sample_rate as f32)
        } else {
            info!("⚙️ Using keyword grammar ({} phrases)", vocabulary.len());
            Recognizer::new_with_grammar(&self.model, sample_rate as f32, vocabulary)
        };

        let mut recognizer = recognizer
            .ok_or_else(|| RoboError::Recognizer("Failed to create Vosk recognizer".to_string()))?;
        recognizer.set_words(true);

        Ok(Box::new(VoskRecognizer { recognizer }))
    }
}

/// Vosk-based recognizer for a single session
pub struct VoskRecognizer {
    recognizer: Recognizer,
}

impl SpeechRecognizer for VoskRecognizer {
    fn accept_waveform(&mut self, samples: &[i16]) -> RoboResult<Transcript> {
        match self.recognizer.accept_waveform(samples) {
            DecodingState::Finalized => {
                let result = self.recognizer.final_result();
                let Some(single) = result.single() else {
                    return Ok(Transcript::Nothing);
                };
                let Some(text) = extract_text(single.text) else {
                    return Ok(Transcript::Nothing);
                };

                let confidence = if single.result.is_empty() {
                    None
                } else {
                    let sum: f32 = single.result.iter().map(|w| w.conf).sum();
                    Some(sum / single.result.len() as f32)
                };

                Ok(Transcript::Final(AsrResult { text, confidence }))
            }
            DecodingState::Running => Ok(Transcript::Partial(
                self.recognizer.partial_result().partial.to_string(),
            )),
            DecodingState::Failed => {
                debug!("Decoding failed for this chunk");
                Ok(Transcript::Nothing)
            }
        }
    }
}

/// Locate the speech model.
///
/// A configured path must exist. Otherwise the first existing standard
/// location wins.
pub fn find_model_path(configured: &str) -> RoboResult<PathBuf> {
    if !configured.trim().is_empty() {
        let path = PathBuf::from(configured.trim());
        return if path.exists() {
            Ok(path)
        } else {
            Err(RoboError::ModelNotFound(path))
        };
    }

    model_candidates()
        .into_iter()
        .find(|candidate| candidate.exists())
        .ok_or_else(|| RoboError::ModelNotFound(PathBuf::from(DEFAULT_MODEL_NAME)))
}

fn model_candidates() -> Vec<PathBuf> {
    let candidates: Vec<Option<PathBuf>> = vec![
        // Working directory, as unpacked from the model archive
        Some(PathBuf::from(DEFAULT_MODEL_NAME)),
        Some(PathBuf::from("model").join(DEFAULT_MODEL_NAME)),
        // User data dir
        dirs::data_dir().map(|d| d.join("vosk/model")),
        dirs::data_dir().map(|d| d.join("robovoice/models").join(DEFAULT_MODEL_NAME)),
        // System-wide
        Some(PathBuf::from("/usr/share/vosk/model")),
        Some(PathBuf::from("/usr/local/share/vosk/model")),
    ];
    candidates.into_iter().flatten().collect()
}

/// Extract text from Vosk result, filtering empty results
fn extract_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text() {
        assert_eq!(extract_text(""), None);
        assert_eq!(extract_text("  "), None);
        assert_eq!(extract_text("hello"), Some("hello".to_string()));
        assert_eq!(extract_text("  hello  "), Some("hello".to_string()));
    }

    #[test]
    fn test_configured_model_must_exist() {
        let err = find_model_path("/definitely/not/a/model").unwrap_err();
        assert!(matches!(err, RoboError::ModelNotFound(p) if p == Path::new("/definitely/not/a/model")));
    }

    #[test]
    fn test_configured_model_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        assert_eq!(find_model_path(&path).unwrap(), dir.path());
    }

    #[test]
    fn test_load_missing_model_is_fatal() {
        let err = VoskEngine::load(Path::new("/definitely/not/a/model")).unwrap_err();
        assert!(matches!(err, RoboError::ModelNotFound(_)));
    }

    #[test]
    fn test_candidates_start_with_working_dir() {
        let candidates = model_candidates();
        assert_eq!(candidates[0], PathBuf::from(DEFAULT_MODEL_NAME));
    }
}
