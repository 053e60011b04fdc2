//! Mock recognizer for testing
//!
//! Replays a script of transcripts, one per audio frame.

use robovoice::asr::{AsrResult, RecognizerFactory, SpeechRecognizer, Transcript};
use robovoice::{RoboError, RoboResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn final_text(text: &str) -> Transcript {
    Transcript::Final(AsrResult::new(text))
}

pub fn final_with_confidence(text: &str, confidence: f32) -> Transcript {
    Transcript::Final(AsrResult::with_confidence(text, confidence))
}

pub fn partial(text: &str) -> Transcript {
    Transcript::Partial(text.to_string())
}

/// Mock recognizer factory; every session replays the same script
#[derive(Default)]
pub struct MockRecognizers {
    script: Vec<Transcript>,
    /// Fail `create` with this message
    pub fail_with: Option<String>,
    /// Vocabulary passed to the last `create`
    pub vocabulary: Mutex<Vec<String>>,
    pub created: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    pub frames: Arc<AtomicUsize>,
}

impl MockRecognizers {
    pub fn new(script: Vec<Transcript>) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Frames fed to recognizers across all sessions
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn vocabulary(&self) -> Vec<String> {
        self.vocabulary.lock().unwrap().clone()
    }
}

impl RecognizerFactory for MockRecognizers {
    fn create(
        &self,
        _sample_rate: u32,
        vocabulary: &[String],
    ) -> RoboResult<Box<dyn SpeechRecognizer>> {
        if let Some(message) = &self.fail_with {
            return Err(RoboError::Model(message.clone()));
        }
        *self.vocabulary.lock().unwrap() = vocabulary.to_vec();
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRecognizer {
            script: self.script.iter().cloned().collect(),
            released: Arc::clone(&self.released),
            frames: Arc::clone(&self.frames),
        }))
    }
}

struct MockRecognizer {
    script: VecDeque<Transcript>,
    released: Arc<AtomicUsize>,
    frames: Arc<AtomicUsize>,
}

impl SpeechRecognizer for MockRecognizer {
    fn accept_waveform(&mut self, _samples: &[i16]) -> RoboResult<Transcript> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.pop_front().unwrap_or(Transcript::Nothing))
    }
}

impl Drop for MockRecognizer {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
