//! # Validate Command Implementation
//!
//! Parses a config spec and reports the first malformed line, without
//! looking at any repository. With `--list`, every rule is printed in the
//! order it will be tried.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use configspec::exit_codes;
use configspec::output::{dim, OutputConfig, Status};
use configspec::spec::{self, Action};

use super::DEFAULT_SPEC_FILE;

/// Check that a config spec parses
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Config spec file
    #[arg(value_name = "SPEC", env = "CONFIGSPEC_FILE", default_value = DEFAULT_SPEC_FILE)]
    pub spec: PathBuf,

    /// Print the parsed rules
    #[arg(short, long)]
    pub list: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, out: &OutputConfig) -> Result<u8> {
    println!(
        "{} Validating config spec: {}",
        Status::Scan.marker(out),
        args.spec.display()
    );

    let text = std::fs::read_to_string(&args.spec)
        .with_context(|| format!("Cannot read config spec {}", args.spec.display()))?;

    let rules = match spec::parse(&text) {
        Ok(rules) => rules,
        Err(e) => {
            eprintln!("{} {}", Status::Error.marker(out), e);
            return Ok(exit_codes::PARSE_FAILURE);
        }
    };

    if args.list {
        for rule in &rules {
            let marker = match rule.action {
                Action::Select => Status::Fetch,
                Action::Exclude => Status::Exclude,
            };
            println!(
                "   {} {} {}",
                marker.marker(out),
                rule,
                dim(format!("(line {})", rule.source_line))
            );
        }
    }

    let excluded = rules.iter().filter(|r| r.action == Action::Exclude).count();
    println!(
        "{} Config spec is valid: {} rule(s), {} exclusion(s)",
        Status::Ok.marker(out),
        rules.len(),
        excluded
    );
    Ok(exit_codes::SUCCESS)
}
