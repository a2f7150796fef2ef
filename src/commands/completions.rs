//! # Completions Command Implementation
//!
//! Prints a shell completion script generated by `clap_complete`.
//!
//! ```bash
//! configspec completions bash > ~/.local/share/bash-completion/completions/configspec
//! configspec completions zsh > ~/.zfunc/_configspec
//! configspec completions fish > ~/.config/fish/completions/configspec.fish
//! ```

use std::io;

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use configspec::exit_codes;

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `args.shell` to stdout.
pub fn execute(args: CompletionsArgs) -> Result<u8> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut io::stdout());
    Ok(exit_codes::SUCCESS)
}
