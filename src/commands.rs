//! Command vocabulary module
//!
//! Maps spoken phrases to robot movement commands. Matching is exact:
//! a transcript either equals a registered synonym or it matches nothing.

use crate::error::{RoboError, RoboResult};
use crate::utils::fuzzy::{self, FuzzyMatch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// A robot command the grammar can recognize
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    #[serde(alias = "horizontal_left")]
    StrafeLeft,
    #[serde(alias = "horizontal_right")]
    StrafeRight,
    Stop,
    Pause,
    Resume,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::StrafeLeft,
        Command::StrafeRight,
        Command::Stop,
        Command::Pause,
        Command::Resume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Forward => "forward",
            Command::Backward => "backward",
            Command::Left => "left",
            Command::Right => "right",
            Command::StrafeLeft => "strafe_left",
            Command::StrafeRight => "strafe_right",
            Command::Stop => "stop",
            Command::Pause => "pause",
            Command::Resume => "resume",
        }
    }

    /// Whether the command drives the robot. Pause and resume are
    /// recognized but carry no action yet.
    pub fn has_action(&self) -> bool {
        !matches!(self, Command::Pause | Command::Resume)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = RoboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('-', "_");
        match key.as_str() {
            "horizontal_left" => return Ok(Command::StrafeLeft),
            "horizontal_right" => return Ok(Command::StrafeRight),
            _ => {}
        }
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| RoboError::Grammar(format!("Unknown command: {}", s)))
    }
}

/// Built-in movement vocabulary
const MOVEMENT_KEYWORDS: &[(Command, &[&str])] = &[
    (
        Command::Forward,
        &["forward", "move forward", "go forward", "go straight", "ahead"],
    ),
    (
        Command::Backward,
        &["backward", "back", "reverse", "move back", "go back"],
    ),
    (
        Command::Left,
        &["left", "turn left", "go left", "rotate left"],
    ),
    (
        Command::Right,
        &["right", "turn right", "go right", "rotate right"],
    ),
    (
        Command::StrafeLeft,
        &["slide left", "strafe left", "shift left", "drift left"],
    ),
    (
        Command::StrafeRight,
        &["slide right", "strafe right", "shift right", "drift right"],
    ),
    (
        Command::Stop,
        &["stop", "halt", "freeze", "brake", "stay"],
    ),
    (Command::Pause, &["pause", "wait", "hold"]),
    (Command::Resume, &["resume", "continue", "go"]),
];

/// Minimum similarity for the near-miss hint on unmatched transcripts
const HINT_CUTOFF: f64 = 0.6;

/// Immutable phrase → command table
#[derive(Debug, Clone)]
pub struct KeywordGrammar {
    entries: Vec<(Command, Vec<String>)>,
    index: HashMap<String, Command>,
}

impl KeywordGrammar {
    /// Build a grammar from ordered (command, synonyms) entries.
    ///
    /// Phrases are lowercased and whitespace-normalized. A phrase registered
    /// under two different commands is rejected.
    pub fn new<I, P>(entries: I) -> RoboResult<Self>
    where
        I: IntoIterator<Item = (Command, Vec<P>)>,
        P: AsRef<str>,
    {
        let mut grammar = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        for (command, phrases) in entries {
            for phrase in phrases {
                grammar.insert(command, phrase.as_ref())?;
            }
        }
        Ok(grammar)
    }

    /// The built-in robot movement grammar
    pub fn movement() -> Self {
        let mut grammar = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        for (command, phrases) in MOVEMENT_KEYWORDS {
            for phrase in *phrases {
                // The built-in table has no cross-command duplicates
                let _ = grammar.insert(*command, phrase);
            }
        }
        grammar
    }

    /// Merge additional synonyms, rejecting any that collide with another command
    pub fn with_synonyms(mut self, extra: &BTreeMap<Command, Vec<String>>) -> RoboResult<Self> {
        for (command, phrases) in extra {
            for phrase in phrases {
                self.insert(*command, phrase)?;
            }
        }
        Ok(self)
    }

    fn insert(&mut self, command: Command, phrase: &str) -> RoboResult<()> {
        let phrase = fuzzy::normalize_text(phrase);
        if phrase.is_empty() {
            return Err(RoboError::Grammar(format!(
                "Empty phrase registered for '{}'",
                command
            )));
        }

        match self.index.get(&phrase) {
            Some(existing) if *existing == command => return Ok(()),
            Some(existing) => {
                return Err(RoboError::Grammar(format!(
                    "Phrase '{}' is registered for both '{}' and '{}'",
                    phrase, existing, command
                )));
            }
            None => {}
        }

        self.index.insert(phrase.clone(), command);
        match self.entries.iter_mut().find(|(c, _)| *c == command) {
            Some((_, phrases)) => phrases.push(phrase),
            None => self.entries.push((command, vec![phrase])),
        }
        Ok(())
    }

    /// Classify a final transcript.
    ///
    /// Exact phrase equality after lowercasing and trimming; inner
    /// whitespace must match the registered phrase.
    pub fn classify(&self, transcript: &str) -> Option<Command> {
        let key = transcript.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.index.get(&key).copied()
    }

    /// Closest registered phrase for an unmatched transcript
    pub fn closest_phrase(&self, transcript: &str) -> Option<FuzzyMatch> {
        fuzzy::find_best_match(transcript, self.vocabulary(), HINT_CUTOFF)
    }

    /// Registered synonyms for a command, in registration order
    pub fn synonyms(&self, command: Command) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| *c == command)
            .map(|(_, phrases)| phrases.as_slice())
            .unwrap_or(&[])
    }

    /// Commands with at least one synonym, in registration order
    pub fn commands(&self) -> impl Iterator<Item = Command> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    /// Flattened phrase list used to constrain the recognizer
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .flat_map(|(_, phrases)| phrases.iter().map(String::as_str))
    }

    /// The vocabulary as a JSON array, the form recognizers accept as a grammar
    pub fn vocabulary_json(&self) -> RoboResult<String> {
        let words: Vec<&str> = self.vocabulary().collect();
        Ok(serde_json::to_string(&words)?)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Human-readable command table
    pub fn describe(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = format!(
            "{rule}\n{:^60}\n{rule}\n",
            "ROBOT MOVEMENT KEYWORDS"
        );
        for (command, phrases) in &self.entries {
            let note = if command.has_action() { "" } else { " (no action)" };
            out.push_str(&format!(
                "\n{}{}\n   Synonyms: {}\n",
                command.as_str().to_uppercase(),
                note,
                phrases.join(", ")
            ));
        }
        out.push_str(&format!(
            "\n{rule}\nTotal movement commands: {}\n{rule}\n",
            self.entries.len()
        ));
        out
    }
}

impl Default for KeywordGrammar {
    fn default() -> Self {
        Self::movement()
    }
}

/// Optional wake phrase gate in front of command dispatch.
///
/// Without a phrase the gate is always open. With a phrase, hearing it opens
/// the gate for `window`.
#[derive(Debug, Clone)]
pub struct WakeGate {
    phrase: Option<String>,
    window: Duration,
    armed_until: Option<Instant>,
}

impl WakeGate {
    pub fn disabled() -> Self {
        Self {
            phrase: None,
            window: Duration::ZERO,
            armed_until: None,
        }
    }

    pub fn new(phrase: &str, window: Duration) -> Self {
        let phrase = fuzzy::normalize_text(phrase);
        if phrase.is_empty() {
            return Self::disabled();
        }
        Self {
            phrase: Some(phrase),
            window,
            armed_until: None,
        }
    }

    pub fn phrase(&self) -> Option<&str> {
        self.phrase.as_deref()
    }

    pub fn is_wake_phrase(&self, transcript: &str) -> bool {
        self.phrase
            .as_deref()
            .is_some_and(|p| *p == transcript.trim().to_lowercase())
    }

    pub fn arm(&mut self, now: Instant) {
        self.armed_until = Some(now + self.window);
    }

    pub fn is_armed(&self, now: Instant) -> bool {
        match (&self.phrase, self.armed_until) {
            (None, _) => true,
            (Some(_), Some(until)) => now < until,
            (Some(_), None) => false,
        }
    }
}
