//! # Resolve Command Implementation
//!
//! Prints the outcome the config spec selects for every path of the tree:
//! the chosen revision and the rule that chose it, or the exclusion. Paths
//! the selected revision does not contain are listed as absent.

use anyhow::Result;
use clap::Args;

use configspec::cancel::CancelToken;
use configspec::orchestrator::{self, Mode, Outcome};
use configspec::output::{dim, OutputConfig, Status};
use configspec::resolver::Selection;

use super::{report_failure, SourceArgs};

/// Show the revision selected for every path
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Hide excluded paths
    #[arg(long)]
    pub selected_only: bool,

    /// Print the selection as JSON (path to revision, null when excluded)
    #[arg(long, conflicts_with = "selected_only")]
    pub json: bool,
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs, out: &OutputConfig, cancel: &CancelToken) -> Result<u8> {
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
        let map: std::collections::BTreeMap<&str, Option<&str>> = report
            .selection
            .iter()
            .map(|(path, chosen)| (path.as_str(), chosen.revision().map(|r| r.as_str())))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(outcome.exit_code());
    }

    for (path, chosen) in report.selection.iter() {
        match chosen {
            Selection::Resolved {
                revision,
                rule_line,
            } => println!(
                "{} {} @ {} {}",
                Status::Ok.marker(out),
                path,
                revision,
                dim(format!("(line {})", rule_line))
            ),
            Selection::Excluded { rule_line } if !args.selected_only => {
                let why = match rule_line {
                    Some(line) => format!("(excluded by line {})", line),
                    None => "(no matching rule)".to_string(),
                };
                println!("{} {} {}", Status::Exclude.marker(out), path, dim(why));
            }
            Selection::Absent {
                revision,
                rule_line,
            } if !args.selected_only => println!(
                "{} {} {}",
                Status::Exclude.marker(out),
                path,
                dim(format!("(absent at {}, line {})", revision, rule_line))
            ),
            Selection::Excluded { .. } | Selection::Absent { .. } => {}
        }
    }

    let selection = &report.selection;
    let absent = selection.absent_count();
    print!(
        "\n{} path(s): {} selected, {} excluded",
        selection.len(),
        selection.len() - selection.excluded_count() - absent,
        selection.excluded_count()
    );
    if absent > 0 {
        print!(", {} absent", absent);
    }
    println!();
    Ok(outcome.exit_code())
}
