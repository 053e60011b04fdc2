//! RoboVoice - Voice Control for Mobile Robots
//!
//! Listens for movement commands and drives the robot controller.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use robovoice::asr::{find_model_path, VoskEngine};
use robovoice::audio::{self, MicrophoneFactory};
use robovoice::audit::ActionLog;
use robovoice::config::Config;
use robovoice::dispatcher::{self, CommandDispatcher, DispatchEvent, ListenOptions, ListenState};
use robovoice::{CalibrationStore, Command, KeywordGrammar, RobotController};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Vosk model directory
    #[arg(short, long)]
    model: Option<String>,

    /// Audio input device index
    #[arg(short, long)]
    device: Option<usize>,

    /// Samples per audio frame (4096-8192)
    #[arg(long)]
    frame_size: Option<usize>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Listen for voice commands until Ctrl+C (default)
    Listen,
    /// Print the command keywords
    Keywords,
    /// List audio input devices
    Devices,
    /// Inspect or change calibration
    Calibration {
        #[command(subcommand)]
        action: CalibrationCmd,
    },
    /// Run one robot command with the current calibration
    Test {
        /// forward, backward, left, right, strafe_left, strafe_right or stop
        command: String,
    },
}

#[derive(Subcommand, Debug)]
enum CalibrationCmd {
    /// Print every setting
    Show,
    /// Print one setting
    Get { category: String, key: String },
    /// Change one setting and save
    Set {
        category: String,
        key: String,
        value: f64,
    },
    /// Write the current settings to the calibration file
    Save,
    /// Restore and save the defaults
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(model) = &args.model {
        config.vosk_model_path = model.clone();
    }
    if args.device.is_some() {
        config.audio_device = args.device;
    }
    if let Some(frame_size) = args.frame_size {
        config.frame_size = frame_size;
    }

    // Setup logging
    let level = if args.verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let grammar = KeywordGrammar::movement()
        .with_synonyms(&config.extra_synonyms)
        .context("Invalid extra_synonyms in config")?;

    match args.command.unwrap_or(Cmd::Listen) {
        Cmd::Listen => listen(config, grammar).await,
        Cmd::Keywords => {
            println!("{}", grammar.describe());
            println!("Recognizer grammar: {}", grammar.vocabulary_json()?);
            Ok(())
        }
        Cmd::Devices => {
            for (i, name) in audio::list_input_devices()? {
                let marker = if config.audio_device == Some(i) { "*" } else { " " };
                println!("  {} [{}] {}", marker, i, name);
            }
            Ok(())
        }
        Cmd::Calibration { action } => calibration(&config, action),
        Cmd::Test { command } => {
            let command: Command = command.parse()?;
            let store = Arc::new(CalibrationStore::open(&config.calibration_path));
            let robot = RobotController::new(store);
            info!("🧪 Testing {} movement...", command);
            match dispatcher::execute(&robot, command) {
                Some(result) => result?,
                None => warn!("'{}' has no robot action", command),
            }
            Ok(())
        }
    }
}

fn calibration(config: &Config, action: CalibrationCmd) -> Result<()> {
    let store = CalibrationStore::open(&config.calibration_path);
    match action {
        CalibrationCmd::Show => {
            println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        }
        CalibrationCmd::Get { category, key } => {
            println!("{}", store.get(&category, &key));
        }
        CalibrationCmd::Set {
            category,
            key,
            value,
        } => {
            store.set(&category, &key, value)?;
            store.save().context("Failed to save calibration")?;
            println!("{}.{} = {}", category, key, value);
        }
        CalibrationCmd::Save => {
            store.save().context("Failed to save calibration")?;
            println!("Calibration saved to {}", store.path().display());
        }
        CalibrationCmd::Reset => {
            store
                .reset_to_defaults()
                .context("Failed to save calibration")?;
            println!("Calibration reset to defaults");
        }
    }
    Ok(())
}

async fn listen(config: Config, grammar: KeywordGrammar) -> Result<()> {
    info!("🤖 RoboVoice v{} starting...", env!("CARGO_PKG_VERSION"));

    // A missing model is fatal: never enter listening mode without one
    let model_path = find_model_path(&config.vosk_model_path)?;
    let engine = VoskEngine::load(&model_path)?;

    let calibration = Arc::new(CalibrationStore::open(&config.calibration_path));
    let robot = Arc::new(RobotController::new(Arc::clone(&calibration)));
    let microphone = MicrophoneFactory::new(config.audio_device, config.read_timeout());

    let (tx, mut rx) = mpsc::unbounded_channel::<DispatchEvent>();
    let mut dispatcher = CommandDispatcher::new(
        grammar,
        Arc::new(engine),
        Arc::new(microphone),
        robot,
        calibration,
    )
    .with_events(Arc::new(tx))
    .with_options(ListenOptions::from(&config))?;
    if config.action_log {
        dispatcher = dispatcher.with_action_log(ActionLog::new(config.action_log_path()));
    }
    println!("{}", dispatcher.grammar().describe());

    dispatcher.start()?;
    info!("✅ RoboVoice ready - speak a command (Ctrl+C to quit)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received");
                break;
            }
            event = rx.recv() => match event {
                Some(event) => {
                    if !present(event) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    // stop() waits on the listen thread; keep it off the async workers
    let stopped = tokio::task::spawn_blocking(move || {
        let outcome = dispatcher.stop();
        drop(dispatcher);
        outcome
    })
    .await?;
    info!("Application closed ({:?})", stopped);
    Ok(())
}

/// Show one event; returns false once the session has ended on its own
fn present(event: DispatchEvent) -> bool {
    match event {
        DispatchEvent::Status(state) => {
            println!("Status: {}", state);
            return state == ListenState::Listening;
        }
        DispatchEvent::Heard(text) => println!("Heard: \"{}\"", text),
        DispatchEvent::Partial(_) => {}
        DispatchEvent::Dispatched { command, .. } => println!("→ {}", command),
        DispatchEvent::Recognized { command, .. } => println!("→ {} (no action)", command),
        DispatchEvent::WakeWord(_) => println!("Listening for a command..."),
        DispatchEvent::Notice(message) => println!("{}", message),
        DispatchEvent::Fault(message) => eprintln!("Error: {}", message),
    }
    true
}
