//! Apply command implementation
//!
//! Runs the whole pipeline under the working tree lock: parse the config
//! spec, resolve every path, plan against the recorded state and apply the
//! batch through the store. A failed operation stops the batch; what already
//! ran stays applied and is recorded, so running `apply` again resumes.

use std::time::Instant;

use anyhow::Result;
use clap::Args;

use configspec::cancel::CancelToken;
use configspec::error::Error;
use configspec::orchestrator::{self, Mode, Outcome};
use configspec::output::{OutputConfig, Status};

use super::{report_failure, SourceArgs};

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the apply command
pub fn execute(args: ApplyArgs, out: &OutputConfig, cancel: &CancelToken) -> Result<u8> {
    if let Some(inventory) = &args.source.inventory {
        anyhow::bail!(
            "apply needs a git working tree; --inventory {} is only usable with resolve and plan",
            inventory.display()
        );
    }

    let start_time = Instant::now();
    let mut source = args.source.load()?;
    let outcome = orchestrator::execute(
        &source.spec_text,
        source.store.as_mut(),
        source.options,
        Mode::Apply,
        cancel,
    );

    match &outcome {
        Outcome::Success(report) => {
            if !args.quiet {
                if report.batch.is_empty() {
                    println!("{} Working tree is up to date", Status::Ok.marker(out));
                } else {
                    println!(
                        "{} Applied {} fetch(es) and {} removal(s) in {:.2}s",
                        Status::Ok.marker(out),
                        report.batch.fetch_count(),
                        report.batch.remove_count(),
                        start_time.elapsed().as_secs_f64()
                    );
                }
            }
        }
        Outcome::StoreFailure(Error::Store(e)) => {
            report_failure(out, &outcome);
            eprintln!("   {} operation(s) not applied:", e.unapplied().len());
            for op in &e.unapplied() {
                eprintln!("   - {}", op);
            }
            eprintln!("   Run apply again to resume.");
        }
        _ => report_failure(out, &outcome),
    }

    Ok(outcome.exit_code())
}
