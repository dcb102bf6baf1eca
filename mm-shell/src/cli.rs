//! Command line options

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::history::default_history_path;
use crate::logging::{parse_level, LogConfig};

/// Interactive shell for memory-map devices
#[derive(Parser, Debug, Clone)]
#[command(name = "mock-cli", author, version, about, long_about = None)]
pub struct Cli {
    /// Log level: TRACE, DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long, default_value = "INFO", value_parser = parse_level)]
    pub loglevel: Level,

    /// Only log these components at --loglevel (others log warnings only)
    #[arg(long, num_args = 1..)]
    pub logmodules: Vec<String>,

    /// Serial port of the device; without it the connection wizard runs
    #[arg(short, long)]
    pub port: Option<String>,

    /// Memory map JSON file (defaults to the built-in mock map)
    #[arg(long = "mm_path")]
    pub mm_path: Option<PathBuf>,

    /// Talk to a simulated device instead of real hardware
    #[arg(long)]
    pub sim: bool,

    /// Serial baud rate
    #[arg(long, default_value_t = 115_200)]
    pub baudrate: u32,

    /// Command history file (default: ~/.mock_cli_history)
    #[arg(long)]
    pub history_file: Option<PathBuf>,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(self.loglevel, &self.logmodules)
    }

    /// History file to use, if one can be determined
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file.clone().or_else(default_history_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["mock-cli"]).unwrap();
        assert_eq!(cli.loglevel, Level::INFO);
        assert!(cli.logmodules.is_empty());
        assert!(cli.port.is_none());
        assert!(!cli.sim);
        assert_eq!(cli.baudrate, 115_200);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "mock-cli",
            "--loglevel",
            "warning",
            "--logmodules",
            "mm_sim",
            "mm-detect",
            "-p",
            "/dev/ttyACM0",
            "--mm_path",
            "map.json",
            "--sim",
            "--history-file",
            "/tmp/h",
        ])
        .unwrap();
        assert_eq!(cli.loglevel, Level::WARN);
        assert_eq!(cli.log_config().modules, vec!["mm_sim", "mm_detect"]);
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(cli.mm_path, Some(PathBuf::from("map.json")));
        assert!(cli.sim);
        assert_eq!(cli.history_path(), Some(PathBuf::from("/tmp/h")));
    }

    #[test]
    fn test_bad_level_rejected() {
        assert!(Cli::try_parse_from(["mock-cli", "--loglevel", "loud"]).is_err());
    }
}
