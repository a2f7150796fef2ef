//! # CLI Command Implementations
//!
//! One file per subcommand. Each defines an `Args` struct derived with
//! `clap` and an `execute` function returning the process exit code.
//!
//! The commands that need a working tree share [`SourceArgs`], which locates
//! the config spec, the tree, its settings and the store to run against.

pub mod apply;
pub mod completions;
pub mod plan;
pub mod resolve;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::debug;

use configspec::config::{self, ResolutionOptions, Settings};
use configspec::git_store::GitStore;
use configspec::orchestrator::Outcome;
use configspec::output::{dim, OutputConfig, Status};
use configspec::planner::CurrentState;
use configspec::store::{MemoryStore, VersionStore};

/// Default config spec file name, looked up in the current directory.
pub const DEFAULT_SPEC_FILE: &str = "CONFIG_SPEC";

/// Where the config spec, the working tree and its revisions come from.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Config spec file
    #[arg(value_name = "SPEC", env = "CONFIGSPEC_FILE", default_value = DEFAULT_SPEC_FILE)]
    pub spec: PathBuf,

    /// Working tree root
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    pub tree: PathBuf,

    /// Read the revision inventory from a JSON file instead of git
    #[arg(long, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Current state as a JSON map of path to revision (with --inventory)
    #[arg(long, value_name = "FILE", requires = "inventory")]
    pub state: Option<PathBuf>,

    /// Repository root inside the tree; repeat for several (overrides settings)
    #[arg(long = "repo", value_name = "DIR")]
    pub repositories: Vec<String>,

    /// Report only the first path that fails to resolve
    #[arg(long)]
    pub stop_on_first_error: bool,

    /// Match patterns case-insensitively
    #[arg(long)]
    pub case_insensitive: bool,

    /// Skip repository roots that do not exist instead of failing
    #[arg(long)]
    pub ignore_nonexisting: bool,
}

/// Everything a run needs, loaded from [`SourceArgs`].
pub struct Source {
    pub spec_text: String,
    pub options: ResolutionOptions,
    pub store: Box<dyn VersionStore>,
}

impl SourceArgs {
    /// Settings from `.configspec.toml`, with command-line overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = config::load_or_default(&self.tree)?;
        if self.stop_on_first_error {
            settings.resolution.stop_on_first_error = true;
        }
        if self.case_insensitive {
            settings.resolution.case_sensitive_paths = false;
        }
        if !self.repositories.is_empty() {
            settings.store.repositories = self.repositories.clone();
        }
        Ok(settings)
    }

    pub fn load(&self) -> Result<Source> {
        let spec_text = std::fs::read_to_string(&self.spec)
            .with_context(|| format!("Cannot read config spec {}", self.spec.display()))?;
        let settings = self.settings()?;

        let store: Box<dyn VersionStore> = match &self.inventory {
            Some(path) => {
                debug!("Using inventory file {}", path.display());
                let mut store = MemoryStore::from_json_file(path)
                    .with_context(|| format!("Cannot load inventory {}", path.display()))?;
                if let Some(state_path) = &self.state {
                    let content = std::fs::read_to_string(state_path)
                        .with_context(|| format!("Cannot read state {}", state_path.display()))?;
                    let state: CurrentState = serde_json::from_str(&content)
                        .with_context(|| format!("Invalid state file {}", state_path.display()))?;
                    store = store.with_state(state);
                }
                Box::new(store)
            }
            None => Box::new(GitStore::open(
                &self.tree,
                &settings.store,
                self.ignore_nonexisting,
            )?),
        };

        Ok(Source {
            spec_text,
            options: settings.resolution,
            store,
        })
    }
}

/// Print why a run failed, to stderr.
pub fn report_failure(out: &OutputConfig, outcome: &Outcome) {
    let err = Status::Error.marker(out);
    match outcome {
        Outcome::Success(_) => {}
        Outcome::ParseFailure(e) => eprintln!("{} {}", err, e),
        Outcome::ResolutionFailure(errors) => {
            eprintln!("{} {} path(s) could not be resolved:", err, errors.len());
            for e in errors {
                eprintln!("   {}", e);
            }
        }
        Outcome::StoreFailure(e) => eprintln!("{} {}", err, e),
        Outcome::TreeBusy => eprintln!(
            "{} Working tree is busy: another run holds the lock. Try again later.",
            err
        ),
        Outcome::Cancelled => eprintln!(
            "{} Cancelled {}",
            Status::Warning.marker(out),
            dim("(no changes were made)")
        ),
    }
}
