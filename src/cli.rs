//! CLI argument parsing and command dispatch

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::warn;

use configspec::cancel::CancelToken;
use configspec::exit_codes;
use configspec::output::OutputConfig;

use crate::commands;

/// Config Spec - ClearCase-style version selection for git working trees
#[derive(Parser, Debug)]
#[command(name = "configspec")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that a config spec parses
    Validate(commands::validate::ValidateArgs),

    /// Show the revision selected for every path
    Resolve(commands::resolve::ResolveArgs),

    /// Show the operations an apply would run, without running them
    Plan(commands::plan::PlanArgs),

    /// Bring the working tree to the revisions the config spec selects
    Apply(commands::apply::ApplyArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> ExitCode {
        init_logging(&self.log_level);

        let out = OutputConfig::from_env_and_flag(&self.color);
        out.install();

        let result = match self.command {
            Commands::Validate(args) => commands::validate::execute(args, &out),
            Commands::Resolve(args) => commands::resolve::execute(args, &out, &cancel_on_interrupt()),
            Commands::Plan(args) => commands::plan::execute(args, &out, &cancel_on_interrupt()),
            Commands::Apply(args) => commands::apply::execute(args, &out, &cancel_on_interrupt()),
            Commands::Completions(args) => commands::completions::execute(args),
        };

        match result {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(exit_codes::ERROR)
            }
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second initialization only happens in tests that drive the CLI in-process.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

/// A token that Ctrl-C cancels.
fn cancel_on_interrupt() -> CancelToken {
    let token = CancelToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
    token
}
