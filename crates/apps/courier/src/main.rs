//! Courier - command-line access to the triage bookkeeping
//!
//! Parses Gmail search strings and inspects or updates usage and
//! subscription records.

use log::{error, warn};
use std::process::ExitCode;
use triage::Settings;

mod commands;

use commands::Command;

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = Settings::load().and_then(|settings| {
        let command = Command::from_args(&args)?;
        commands::run(command, &settings)
    });

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
