//! Log configuration
//!
//! Built once from the command line and installed as the global subscriber.
//! `RUST_LOG`, when set, takes precedence.

use std::io;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Parse a level name as accepted by `--loglevel`
pub fn parse_level(s: &str) -> Result<Level, String> {
    match s.to_ascii_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARNING" | "WARN" => Ok(Level::WARN),
        "ERROR" | "CRITICAL" => Ok(Level::ERROR),
        _ => Err(format!(
            "unknown log level '{}' (expected TRACE, DEBUG, INFO, WARNING, ERROR or CRITICAL)",
            s
        )),
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    /// Targets that get `level`; when non-empty everything else is held at warn
    pub modules: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            modules: Vec::new(),
        }
    }
}

impl LogConfig {
    pub fn new(level: Level, modules: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            level,
            modules: modules
                .into_iter()
                .map(|m| m.as_ref().trim().replace('-', "_"))
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Filter directives, e.g. `warn,mm_sim=debug`
    pub fn directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        if self.modules.is_empty() {
            return level;
        }

        let mut directives = vec!["warn".to_string()];
        directives.extend(self.modules.iter().map(|m| format!("{}={}", m, level)));
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    /// Install the global subscriber, writing to stderr
    ///
    /// Fails if a subscriber is already installed.
    pub fn init(&self) -> Result<(), tracing_subscriber::util::TryInitError> {
        tracing_subscriber::registry()
            .with(self.filter())
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init()
    }
}
