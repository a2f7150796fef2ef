//! # Config Spec CLI
//!
//! Binary entry point for the `configspec` command-line tool. Parses the
//! arguments, runs the selected command and turns its result into a process
//! exit code. All resolution logic lives in the library crate.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    cli.execute()
}
