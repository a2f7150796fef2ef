//! # Plan Command Implementation
//!
//! Dry run: resolves the config spec, diffs it against the tree's current
//! state and prints the commands an `apply` would run. Nothing is modified
//! and no lock is taken.

use anyhow::Result;
use clap::Args;

use configspec::cancel::CancelToken;
use configspec::orchestrator::{self, Mode, Outcome};
use configspec::output::{OutputConfig, Status};
use configspec::planner::OperationKind;

use super::{report_failure, SourceArgs};

/// Show the operations an apply would run, without running them
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the batch as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `plan` command.
pub fn execute(args: PlanArgs, out: &OutputConfig, cancel: &CancelToken) -> Result<u8> {
    let mut source = args.source.load()?;
    let outcome = orchestrator::execute(
        &source.spec_text,
        source.store.as_mut(),
        source.options,
        Mode::DryRun,
        cancel,
    );

    let report = match &outcome {
        Outcome::Success(report) => report,
        _ => {
            report_failure(out, &outcome);
            return Ok(outcome.exit_code());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.batch)?);
        return Ok(outcome.exit_code());
    }

    if report.batch.is_empty() {
        println!("{} Working tree is up to date", Status::Ok.marker(out));
        return Ok(outcome.exit_code());
    }

    for op in &report.batch {
        let status = match op.kind() {
            OperationKind::Fetch => Status::Fetch,
            OperationKind::Remove => Status::Remove,
        };
        println!(
            "{} Would run: {}",
            status.marker(out),
            source.store.describe(op)
        );
    }
    println!(
        "\n{} fetch(es), {} removal(s)",
        report.batch.fetch_count(),
        report.batch.remove_count()
    );
    Ok(outcome.exit_code())
}
