//! Binary crate for the `cityfind` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive prompts for search, selection and date ranges
//! - Human-friendly output formatting

use clap::Parser;
use std::process::ExitCode;

mod cli;
mod render;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cityfind=info,cityfind_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cmd = cli::Cli::parse();
    match cmd.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            eprintln!("Run the command again to retry.");
            ExitCode::FAILURE
        }
    }
}
