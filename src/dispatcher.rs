//! Command Dispatcher
//!
//! Owns the Idle/Listening lifecycle. `start` opens a recognition session on
//! a dedicated listen thread; the thread reads fixed-size audio frames, feeds
//! the recognizer, and dispatches at most one robot action per finalized
//! utterance. Partial hypotheses are only reported, never acted on.
//!
//! Cancellation is cooperative: `stop` clears the session's running flag and
//! waits (bounded) for the loop to notice it at the next frame boundary.
//! Stop latency is therefore one frame read plus one recognizer call.

use crate::asr::{AsrResult, RecognizerFactory, SpeechRecognizer, Transcript};
use crate::audio::{AudioFormat, AudioSource, AudioSourceFactory};
use crate::audit::ActionLog;
use crate::calibration::{CalibrationStore, Setting};
use crate::commands::{Command, KeywordGrammar, WakeGate};
use crate::config::{Config, MIN_FRAME_SIZE};
use crate::error::{RoboError, RoboResult};
use crate::robot::RobotDriver;
use crate::utils::normalize_text;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Dispatcher lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    Listening,
}

impl fmt::Display for ListenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenState::Idle => f.write_str("Idle"),
            ListenState::Listening => f.write_str("Listening..."),
        }
    }
}

/// Everything the dispatcher reports to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Status(ListenState),
    /// A finalized, non-empty transcript
    Heard(String),
    /// In-progress hypothesis, for live feedback only
    Partial(String),
    /// A robot action ran for this command
    Dispatched { command: Command, transcript: String },
    /// A command was recognized that has no robot action
    Recognized { command: Command, transcript: String },
    WakeWord(String),
    /// User-facing informational message
    Notice(String),
    /// A fault absorbed by the dispatcher
    Fault(String),
}

/// Receives dispatcher events.
///
/// Called from the listen thread; implementations hand events over to
/// whichever thread owns presentation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DispatchEvent);
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<DispatchEvent> {
    fn emit(&self, event: DispatchEvent) {
        // Receiver gone means nobody is watching
        let _ = self.send(event);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: DispatchEvent) {}
}

/// What happened to one finalized utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Blank transcript
    Empty,
    /// Not a registered phrase
    Unmatched,
    WakeWord,
    /// Matched, but below the calibrated confidence threshold
    LowConfidence(Command),
    /// Matched while the wake gate was closed
    NotArmed(Command),
    Executed(Command),
    /// Matched a command that deliberately has no action
    NoAction(Command),
    /// The robot driver reported an error
    Failed(Command),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyListening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The loop finished and released its audio stream and recognizer
    Stopped,
    /// The loop did not finish in time; it releases its resources when the
    /// in-flight read returns
    TimedOut,
    NotListening,
}

/// Listen loop tuning
#[derive(Debug, Clone)]
pub struct ListenOptions {
    pub frame_size: usize,
    pub stop_timeout: Duration,
    pub wake_word: Option<String>,
    pub wake_window: Duration,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            frame_size: MIN_FRAME_SIZE,
            stop_timeout: Duration::from_secs(1),
            wake_word: None,
            wake_window: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for ListenOptions {
    fn from(config: &Config) -> Self {
        let wake_word = config.wake_word.trim();
        Self {
            frame_size: config.effective_frame_size(),
            stop_timeout: config.stop_timeout(),
            wake_word: (!wake_word.is_empty()).then(|| wake_word.to_string()),
            wake_window: config.wake_window(),
        }
    }
}

/// Run the robot operation for `command`.
///
/// Returns `None` for commands that are recognized but have no action.
pub fn execute(robot: &dyn RobotDriver, command: Command) -> Option<RoboResult<()>> {
    let result = match command {
        Command::Forward => robot.forward(),
        Command::Backward => robot.backward(),
        Command::Left => robot.left(),
        Command::Right => robot.right(),
        Command::StrafeLeft => robot.strafe_left(),
        Command::StrafeRight => robot.strafe_right(),
        Command::Stop => robot.stop(),
        Command::Pause | Command::Resume => return None,
    };
    Some(result)
}

/// Per-session utterance handling, owned by the listen thread
struct UtteranceHandler {
    grammar: Arc<KeywordGrammar>,
    robot: Arc<dyn RobotDriver>,
    calibration: Arc<CalibrationStore>,
    events: Arc<dyn EventSink>,
    action_log: Option<ActionLog>,
    wake: WakeGate,
}

impl UtteranceHandler {
    fn handle_final(&mut self, result: AsrResult) -> DispatchOutcome {
        let text = result.text.trim().to_lowercase();
        if text.is_empty() {
            return DispatchOutcome::Empty;
        }

        info!("📝 Heard: '{}'", text);
        self.events.emit(DispatchEvent::Heard(text.clone()));

        let now = Instant::now();
        if self.wake.is_wake_phrase(&text) {
            self.wake.arm(now);
            info!("👂 Wake word detected");
            self.events.emit(DispatchEvent::WakeWord(text));
            return DispatchOutcome::WakeWord;
        }

        let Some(command) = self.grammar.classify(&text) else {
            match self.grammar.closest_phrase(&text) {
                Some(hint) => debug!(
                    "No command matched for: '{}' (closest: '{}', {:.2})",
                    text, hint.value, hint.score
                ),
                None => debug!("No command matched for: '{}'", text),
            }
            return DispatchOutcome::Unmatched;
        };

        if let Some(confidence) = result.confidence {
            let threshold = self.calibration.get_setting(Setting::ConfidenceThreshold);
            if f64::from(confidence) < threshold {
                info!(
                    "🔇 Rejecting low-confidence command ({:.2} < {:.2}): '{}'",
                    confidence, threshold, text
                );
                self.events.emit(DispatchEvent::Notice(format!(
                    "Not sure I heard \"{}\"; please repeat.",
                    text
                )));
                return DispatchOutcome::LowConfidence(command);
            }
        }

        if !self.wake.is_armed(now) {
            let phrase = self.wake.phrase().unwrap_or_default();
            self.events.emit(DispatchEvent::Notice(format!(
                "Say \"{}\" before a command.",
                phrase
            )));
            return DispatchOutcome::NotArmed(command);
        }

        info!("🎯 Command recognized: '{}' -> {}", text, command.as_str().to_uppercase());
        match execute(self.robot.as_ref(), command) {
            None => {
                debug!("'{}' has no robot action", command);
                self.events.emit(DispatchEvent::Recognized {
                    command,
                    transcript: text,
                });
                DispatchOutcome::NoAction(command)
            }
            Some(Ok(())) => {
                if let Some(log) = &self.action_log {
                    if let Err(e) = log.record(command.as_str(), &text) {
                        warn!("Failed to write action log: {}", e);
                    }
                }
                self.events.emit(DispatchEvent::Dispatched {
                    command,
                    transcript: text,
                });
                DispatchOutcome::Executed(command)
            }
            Some(Err(e)) => {
                warn!("❌ Failed to execute {}: {}", command, e);
                self.events.emit(DispatchEvent::Fault(format!(
                    "Failed to execute {}: {}",
                    command, e
                )));
                DispatchOutcome::Failed(command)
            }
        }
    }
}

fn run_listen_loop(
    running: &AtomicBool,
    mut source: Box<dyn AudioSource>,
    mut recognizer: Box<dyn SpeechRecognizer>,
    frame_size: usize,
    mut handler: UtteranceHandler,
) {
    let mut frame = vec![0i16; frame_size];
    let mut last_partial = String::new();

    while running.load(Ordering::Acquire) {
        let n = match source.read_frame(&mut frame) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) => {
                // A loop already told to stop owns no status anymore
                if running.swap(false, Ordering::AcqRel) {
                    error!("❌ Audio input failed: {}", e);
                    handler.events.emit(DispatchEvent::Fault(e.to_string()));
                    handler
                        .events
                        .emit(DispatchEvent::Status(ListenState::Idle));
                } else {
                    debug!("Audio input closed during shutdown: {}", e);
                }
                break;
            }
        };

        match recognizer.accept_waveform(&frame[..n]) {
            Ok(Transcript::Final(result)) => {
                last_partial.clear();
                handler.handle_final(result);
            }
            Ok(Transcript::Partial(partial)) => {
                if !partial.is_empty() && partial != last_partial {
                    debug!("Partial: {}", partial);
                    handler
                        .events
                        .emit(DispatchEvent::Partial(partial.clone()));
                    last_partial = partial;
                }
            }
            Ok(Transcript::Nothing) => {}
            Err(e) => debug!("Recognizer rejected frame: {}", e),
        }
    }

    debug!("Listen loop exiting");
    // source and recognizer drop here, on the thread that used them
}

/// A live listening session: the loop thread plus its cancellation flag
struct RecognitionSession {
    running: Arc<AtomicBool>,
    // Disconnects once the loop has released its audio stream and recognizer
    done: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Voice command front end: turns finalized utterances into robot actions
pub struct CommandDispatcher {
    grammar: Arc<KeywordGrammar>,
    recognizers: Arc<dyn RecognizerFactory>,
    audio: Arc<dyn AudioSourceFactory>,
    robot: Arc<dyn RobotDriver>,
    calibration: Arc<CalibrationStore>,
    events: Arc<dyn EventSink>,
    action_log: Option<ActionLog>,
    options: ListenOptions,
    session: Option<RecognitionSession>,
}

impl CommandDispatcher {
    pub fn new(
        grammar: KeywordGrammar,
        recognizers: Arc<dyn RecognizerFactory>,
        audio: Arc<dyn AudioSourceFactory>,
        robot: Arc<dyn RobotDriver>,
        calibration: Arc<CalibrationStore>,
    ) -> Self {
        Self {
            grammar: Arc::new(grammar),
            recognizers,
            audio,
            robot,
            calibration,
            events: Arc::new(NullSink),
            action_log: None,
            options: ListenOptions::default(),
            session: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_action_log(mut self, log: ActionLog) -> Self {
        self.action_log = Some(log);
        self
    }

    /// Apply listen options. A wake word that is also a command phrase is rejected.
    pub fn with_options(mut self, options: ListenOptions) -> RoboResult<Self> {
        if options.frame_size == 0 {
            return Err(RoboError::Config("frame size must be positive".to_string()));
        }
        if let Some(wake) = options.wake_word.as_deref() {
            if let Some(command) = self.grammar.classify(&normalize_text(wake)) {
                return Err(RoboError::Config(format!(
                    "Wake word '{}' is already a phrase for '{}'",
                    wake, command
                )));
            }
        }
        self.options = options;
        Ok(self)
    }

    pub fn grammar(&self) -> &KeywordGrammar {
        &self.grammar
    }

    pub fn state(&self) -> ListenState {
        match &self.session {
            Some(session) if session.running.load(Ordering::Acquire) => ListenState::Listening,
            _ => ListenState::Idle,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state() == ListenState::Listening
    }

    fn notice(&self, message: &str) {
        info!("{}", message);
        self.events.emit(DispatchEvent::Notice(message.to_string()));
    }

    /// Forget a session whose loop already ended on its own (audio failure)
    fn reap_finished(&mut self) {
        // Only the loop itself clears the flag of a session that is still held here
        let ended = self
            .session
            .as_ref()
            .is_some_and(|s| !s.running.load(Ordering::Acquire));
        if !ended {
            return;
        }
        if let Some(session) = self.session.take() {
            match session.done.recv_timeout(self.options.stop_timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Ended listen loop has not released audio yet")
                }
                _ => {
                    let _ = session.handle.join();
                    debug!("Reaped finished listen loop");
                }
            }
        }
    }

    /// Idle → Listening.
    ///
    /// Opens the recognizer and audio stream on a new listen thread and
    /// returns once they are open; recognition results arrive as events.
    pub fn start(&mut self) -> RoboResult<StartOutcome> {
        self.reap_finished();
        if self.session.is_some() {
            self.notice("Already listening.");
            return Ok(StartOutcome::AlreadyListening);
        }

        let format = AudioFormat::speech(self.options.frame_size);
        let wake = match &self.options.wake_word {
            Some(phrase) => WakeGate::new(phrase, self.options.wake_window),
            None => WakeGate::disabled(),
        };
        let mut vocabulary: Vec<String> = self.grammar.vocabulary().map(String::from).collect();
        if let Some(phrase) = wake.phrase() {
            vocabulary.push(phrase.to_string());
            info!("📢 Added wake word '{}' to recognizer grammar", phrase);
        }

        let handler = UtteranceHandler {
            grammar: Arc::clone(&self.grammar),
            robot: Arc::clone(&self.robot),
            calibration: Arc::clone(&self.calibration),
            events: Arc::clone(&self.events),
            action_log: self.action_log.clone(),
            wake,
        };
        let recognizers = Arc::clone(&self.recognizers);
        let audio = Arc::clone(&self.audio);
        let running = Arc::new(AtomicBool::new(true));
        let loop_running = Arc::clone(&running);
        let (ready_tx, ready_rx) = mpsc::channel::<RoboResult<()>>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("listen-loop".to_string())
            .spawn(move || {
                let opened = recognizers
                    .create(format.sample_rate, &vocabulary)
                    .and_then(|recognizer| Ok((audio.open(&format)?, recognizer)));

                match opened {
                    Ok((source, recognizer)) => {
                        // Published here so no loop event can precede it
                        handler
                            .events
                            .emit(DispatchEvent::Status(ListenState::Listening));
                        let _ = ready_tx.send(Ok(()));
                        run_listen_loop(&loop_running, source, recognizer, format.frame_size, handler);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
                drop(done_tx);
            })?;

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(RoboError::Recognizer(
                "listen thread exited during startup".to_string(),
            ))
        });
        if let Err(e) = opened {
            let _ = handle.join();
            error!("❌ Could not start voice recognition: {}", e);
            return Err(e);
        }

        self.session = Some(RecognitionSession {
            running,
            done: done_rx,
            handle,
        });

        info!("🎤 Voice recognition started");
        Ok(StartOutcome::Started)
    }

    /// Listening → Idle.
    ///
    /// Clears the running flag, then waits up to the configured stop timeout
    /// for the loop to release its audio stream and recognizer.
    pub fn stop(&mut self) -> StopOutcome {
        self.reap_finished();
        let Some(session) = self.session.take() else {
            self.notice("Not currently listening.");
            return StopOutcome::NotListening;
        };

        info!("Stopping voice recognition...");
        session.running.store(false, Ordering::Release);

        let outcome = match session.done.recv_timeout(self.options.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if session.handle.join().is_err() {
                    warn!("Listen loop panicked");
                }
                info!("🔇 Voice recognition stopped");
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "⚠️ Listen loop still busy after {:?}; it will release audio when its read returns",
                    self.options.stop_timeout
                );
                StopOutcome::TimedOut
            }
        };

        self.events.emit(DispatchEvent::Status(ListenState::Idle));
        outcome
    }

    /// Start when idle, stop when listening
    pub fn toggle(&mut self) -> RoboResult<ListenState> {
        if self.is_listening() {
            self.stop();
        } else {
            self.start()?;
        }
        Ok(self.state())
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.stop();
        }
    }
}
