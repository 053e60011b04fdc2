//! Audio capture module using cpal
//!
//! The cpal callback pushes mono i16 samples into a bounded [`FrameBuffer`];
//! the listen loop pulls fixed-size frames out of it with a blocking read.
//! When the consumer falls behind, the oldest samples are dropped instead of
//! failing the read.

use crate::error::{RoboError, RoboResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sample rate the speech models are trained on
pub const SAMPLE_RATE: u32 = 16000;

/// How many frames the capture buffer holds before dropping old audio
const BUFFERED_FRAMES: usize = 8;

/// Capture format handed to an [`AudioSourceFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per frame read by the listen loop
    pub frame_size: usize,
}

impl AudioFormat {
    /// Mono, 16 kHz, signed 16-bit
    pub fn speech(frame_size: usize) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            frame_size,
        }
    }

    /// Wall-clock duration of one frame
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(self.frame_size as f64 / self.sample_rate as f64)
    }
}

/// A blocking source of mono i16 frames.
///
/// Implementations need not be `Send`: sources are opened and dropped on the
/// listen thread that reads them.
pub trait AudioSource {
    /// Fill `frame` with the next samples and return how many were written.
    ///
    /// May return fewer than `frame.len()` (including zero) when audio is
    /// late or was dropped; that is not an error. Returns
    /// [`RoboError::AudioClosed`] once the stream can never produce more.
    fn read_frame(&mut self, frame: &mut [i16]) -> RoboResult<usize>;
}

/// Opens audio sources for a listening session
pub trait AudioSourceFactory: Send + Sync {
    fn open(&self, format: &AudioFormat) -> RoboResult<Box<dyn AudioSource>>;
}

#[derive(Debug, Default)]
struct BufferState {
    samples: VecDeque<i16>,
    dropped: u64,
    closed: Option<String>,
}

/// Bounded sample queue shared between the capture callback and the reader
#[derive(Debug)]
pub struct FrameBuffer {
    state: Mutex<BufferState>,
    ready: Condvar,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append samples, discarding the oldest ones past capacity
    pub fn push<I: IntoIterator<Item = i16>>(&self, samples: I) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.samples.extend(samples);
        let excess = state.samples.len().saturating_sub(self.capacity);
        if excess > 0 {
            state.samples.drain(..excess);
            state.dropped += excess as u64;
        }
        drop(state);
        self.ready.notify_one();
    }

    /// Mark the buffer as finished; readers drain what is left, then fail
    pub fn close(&self, reason: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.closed.get_or_insert_with(|| reason.to_string());
        }
        self.ready.notify_all();
    }

    /// Wait up to `timeout` for a full frame and copy out what is available
    pub fn read(&self, frame: &mut [i16], timeout: Duration) -> RoboResult<usize> {
        let state = self.state.lock()?;
        let (mut state, _) = self.ready.wait_timeout_while(state, timeout, |s| {
            s.samples.len() < frame.len() && s.closed.is_none()
        })?;

        if state.dropped > 0 {
            debug!("Audio overflow: dropped {} samples", state.dropped);
            state.dropped = 0;
        }

        if state.samples.is_empty() {
            if let Some(reason) = &state.closed {
                return Err(RoboError::AudioClosed(reason.clone()));
            }
        }

        let n = state.samples.len().min(frame.len());
        for (slot, sample) in frame.iter_mut().zip(state.samples.drain(..n)) {
            *slot = sample;
        }
        Ok(n)
    }

    /// Samples currently queued
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.samples.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Live microphone capture
pub struct MicrophoneSource {
    // Dropping the stream stops capture
    _stream: cpal::Stream,
    buffer: Arc<FrameBuffer>,
    read_timeout: Duration,
}

impl AudioSource for MicrophoneSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> RoboResult<usize> {
        self.buffer.read(frame, self.read_timeout)
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.buffer.close("capture stopped");
        debug!("🎙️ Audio capture released");
    }
}

/// Opens the default (or an indexed) input device through cpal
#[derive(Debug, Clone)]
pub struct MicrophoneFactory {
    pub device_index: Option<usize>,
    pub read_timeout: Duration,
}

impl MicrophoneFactory {
    pub fn new(device_index: Option<usize>, read_timeout: Duration) -> Self {
        Self {
            device_index,
            read_timeout,
        }
    }

    fn select_device(&self) -> RoboResult<cpal::Device> {
        let host = cpal::default_host();
        match self.device_index {
            Some(idx) => host
                .input_devices()
                .map_err(|e| RoboError::Audio(e.to_string()))?
                .nth(idx)
                .ok_or_else(|| RoboError::Audio(format!("Device index {} out of range", idx))),
            None => host
                .default_input_device()
                .ok_or_else(|| RoboError::Audio("No default input device".to_string())),
        }
    }
}

impl AudioSourceFactory for MicrophoneFactory {
    fn open(&self, format: &AudioFormat) -> RoboResult<Box<dyn AudioSource>> {
        let device = self.select_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let rate = SampleRate(format.sample_rate);
        let range = device
            .supported_input_configs()
            .map_err(|e| RoboError::Audio(e.to_string()))?
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .filter(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32))
            .min_by_key(|c| (c.channels(), c.sample_format() != SampleFormat::I16))
            .ok_or_else(|| {
                RoboError::Audio(format!(
                    "{} cannot capture at {} Hz",
                    device_name, format.sample_rate
                ))
            })?;

        let supported = range.with_sample_rate(rate);
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        let buffer = Arc::new(FrameBuffer::new(format.frame_size * BUFFERED_FRAMES));
        let stream = build_stream(&device, &config, sample_format, Arc::clone(&buffer))?;
        stream
            .play()
            .map_err(|e| RoboError::Audio(e.to_string()))?;

        info!(
            "🎙️ Capturing from {} ({} Hz, {} ch, {:?}, {} samples/frame)",
            device_name, format.sample_rate, config.channels, sample_format, format.frame_size
        );

        Ok(Box::new(MicrophoneSource {
            _stream: stream,
            buffer,
            read_timeout: self.read_timeout,
        }))
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    buffer: Arc<FrameBuffer>,
) -> RoboResult<cpal::Stream> {
    let channels = config.channels.max(1) as usize;
    let err_buffer = Arc::clone(&buffer);
    let err_fn = move |err: cpal::StreamError| match err {
        cpal::StreamError::DeviceNotAvailable => {
            error!("❌ Audio device no longer available");
            err_buffer.close("audio device no longer available");
        }
        other => warn!("Audio stream error: {}", other),
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                buffer.push(downmix_i16(data, channels));
            },
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                buffer.push(downmix_f32(data, channels));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(RoboError::Audio(format!(
                "Unsupported sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| RoboError::Audio(e.to_string()))
}

/// Average interleaved channels into mono
fn downmix_i16(data: &[i16], channels: usize) -> impl Iterator<Item = i16> + '_ {
    data.chunks(channels).map(|frame| {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        (sum / frame.len() as i32) as i16
    })
}

fn downmix_f32(data: &[f32], channels: usize) -> impl Iterator<Item = i16> + '_ {
    data.chunks(channels).map(|frame| {
        let mono = frame.iter().sum::<f32>() / frame.len() as f32;
        (mono.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
    })
}

/// List input devices as (index, name)
pub fn list_input_devices() -> RoboResult<Vec<(usize, String)>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| RoboError::Audio(e.to_string()))?
        .enumerate()
        .map(|(i, device)| (i, device.name().unwrap_or_else(|_| "Unknown".to_string())))
        .collect();
    Ok(devices)
}
