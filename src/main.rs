//! # Sealwatch Entry Point
//!
//! ## Application Flow
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load config file, apply flag overrides
//!   ├─> Initialize logging
//!   │
//!   ├─> run (default):
//!   │   ├─> Validate config, resolve node type and key store (fatal on error)
//!   │   ├─> Install Ctrl-C handler
//!   │   └─> Watch until shutdown
//!   │
//!   └─> sign | verify | check <file>: one-shot operations
//! ```
//!
//! Any error ends the process with exit code 1.

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout, clippy::print_stderr)] // CLI output

mod cli;

use clap::Parser as _;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    match cli::run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
