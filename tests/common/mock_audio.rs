//! Mock audio input for testing
//!
//! Produces silent frames at a fixed pace and counts opens and releases.

use robovoice::audio::{AudioFormat, AudioSource, AudioSourceFactory};
use robovoice::{RoboError, RoboResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct MockAudio {
    /// Time each read blocks, like a device delivering one frame
    pub frame_delay: Duration,
    /// Fail `open` outright
    pub fail_open: bool,
    /// Report the device as gone after this many reads
    pub fail_after: Option<usize>,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl MockAudio {
    pub fn new(frame_delay: Duration) -> Self {
        Self {
            frame_delay,
            fail_open: false,
            fail_after: None,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for MockAudio {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

impl AudioSourceFactory for MockAudio {
    fn open(&self, format: &AudioFormat) -> RoboResult<Box<dyn AudioSource>> {
        if self.fail_open {
            return Err(RoboError::Audio("no input device".to_string()));
        }
        assert_eq!(format.sample_rate, 16000);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSource {
            frame_delay: self.frame_delay,
            remaining: self.fail_after,
            released: Arc::clone(&self.released),
        }))
    }
}

struct MockSource {
    frame_delay: Duration,
    remaining: Option<usize>,
    released: Arc<AtomicUsize>,
}

impl AudioSource for MockSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> RoboResult<usize> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(RoboError::AudioClosed("device unplugged".to_string()));
            }
            *remaining -= 1;
        }
        thread::sleep(self.frame_delay);
        frame.fill(0);
        Ok(frame.len())
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
