//! mock-cli: interactive shell for memory-map devices

use std::process::ExitCode;

use clap::Parser;
use mm_shell::{app, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = cli.log_config().init() {
        eprintln!("Failed to initialise logging: {}", e);
    }
    tracing::info!("Starting mock-cli {}", env!("CARGO_PKG_VERSION"));

    app::run(&cli)
}
