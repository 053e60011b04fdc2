//! ASR (Automatic Speech Recognition) Module
//!
//! The listen loop talks to recognizers through [`SpeechRecognizer`], so the
//! Vosk backend can be swapped for a scripted one in tests.

pub mod vosk;

use crate::error::RoboResult;

pub use self::vosk::{find_model_path, VoskEngine};

/// A finalized utterance
#[derive(Debug, Clone, PartialEq)]
pub struct AsrResult {
    pub text: String,
    /// Average word confidence, when the recognizer reports one
    pub confidence: Option<f32>,
}

impl AsrResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: Some(confidence),
        }
    }
}

/// What the recognizer made of the audio fed so far
#[derive(Debug, Clone, PartialEq)]
pub enum Transcript {
    /// End of speech detected; the utterance is complete
    Final(AsrResult),
    /// Utterance still in progress; the hypothesis may change
    Partial(String),
    /// Nothing new to report
    Nothing,
}

/// A streaming recognizer bound to one sample rate and vocabulary
pub trait SpeechRecognizer {
    /// Feed one frame of mono i16 audio
    fn accept_waveform(&mut self, samples: &[i16]) -> RoboResult<Transcript>;
}

/// Builds a fresh recognizer for each listening session
pub trait RecognizerFactory: Send + Sync {
    /// `vocabulary` restricts the hypothesis space; empty means unrestricted
    fn create(&self, sample_rate: u32, vocabulary: &[String])
        -> RoboResult<Box<dyn SpeechRecognizer>>;
}
