//! Command history
//!
//! Shared between the command loop and the interrupt watcher, so whichever
//! shutdown path runs first persists it. The file is written at most once
//! per session.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

/// Maximum number of entries kept in the history file
pub const HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Default)]
struct HistoryState {
    entries: Vec<String>,
    path: Option<PathBuf>,
    written: bool,
    writes: usize,
}

/// Session command history
#[derive(Debug, Clone, Default)]
pub struct History {
    state: Arc<Mutex<HistoryState>>,
}

impl History {
    /// History that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load previous entries from `path`, which need not exist yet
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Could not read history {}: {}", path.display(), e);
                Vec::new()
            }
        };
        debug!("Loaded {} history entries from {}", entries.len(), path.display());

        Self {
            state: Arc::new(Mutex::new(HistoryState {
                entries,
                path: Some(path),
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a command line
    pub fn push(&self, line: &str) {
        self.lock().entries.push(line.to_string());
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.lock().entries.clone()
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    /// Persist the newest entries unless already done this session
    ///
    /// Returns whether this call wrote the file.
    pub fn write_once(&self) -> io::Result<bool> {
        let mut state = self.lock();
        if state.written {
            return Ok(false);
        }
        state.written = true;

        let Some(path) = state.path.clone() else {
            return Ok(false);
        };
        let start = state.entries.len().saturating_sub(HISTORY_LIMIT);
        write_entries(&path, &state.entries[start..])?;
        state.writes += 1;
        debug!("Wrote {} history entries to {}", state.entries.len() - start, path.display());
        Ok(true)
    }

    /// Number of times the file has been written
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }
}

fn write_entries(path: &Path, entries: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut text = entries.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(path, text)
}

/// Default history file, `~/.mock_cli_history`
pub fn default_history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mock_cli_history"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let history = History::load(dir.path().join("hist"));
        assert!(history.entries().is_empty());
    }

    #[test]
    fn test_write_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hist");
        let history = History::load(&path);
        history.push("version");
        history.push("special_cmd 3");

        assert!(history.write_once().unwrap());
        history.push("later");
        assert!(!history.clone().write_once().unwrap());
        assert_eq!(history.write_count(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "version\nspecial_cmd 3\n");

        let reloaded = History::load(&path);
        assert_eq!(reloaded.entries(), vec!["version", "special_cmd 3"]);
    }

    #[test]
    fn test_write_keeps_newest_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("hist");
        let history = History::load(&path);
        for i in 0..HISTORY_LIMIT + 5 {
            history.push(&format!("cmd {}", i));
        }
        history.write_once().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), HISTORY_LIMIT);
        assert_eq!(lines[0], "cmd 5");
    }

    #[test]
    fn test_in_memory_never_writes() {
        let history = History::in_memory();
        history.push("help");
        assert!(!history.write_once().unwrap());
        assert_eq!(history.write_count(), 0);
        assert_eq!(history.path(), None);
    }
}
