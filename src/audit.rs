use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only log of robot actions taken on voice commands
#[derive(Debug, Clone)]
pub struct ActionLog {
    path: PathBuf,
}

impl ActionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an entry for a dispatched command
    pub fn record(&self, command: &str, transcript: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(
            file,
            "[{}] ACTION: {} | HEARD: \"{}\"",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            command,
            transcript
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActionLog::new(dir.path().join("logs/robot_actions.log"));

        log.record("forward", "go forward").unwrap();
        log.record("stop", "halt").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ACTION: forward | HEARD: \"go forward\""));
        assert!(lines[1].contains("ACTION: stop"));
    }
}
