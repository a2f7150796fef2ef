//! # Run Orchestration
//!
//! Drives one complete run against a [`VersionStore`]:
//!
//! 1. Parse the config spec text into rules.
//! 2. Take the working tree lock (apply mode only).
//! 3. Ask the store for its inventory.
//! 4. Resolve every path of the inventory's universe.
//! 5. Ask the store for its current state and plan the batch.
//! 6. Apply the batch (apply mode only).
//!
//! Each stage's failure maps to exactly one [`Outcome`], and every outcome
//! has its own process exit code. A stage never starts after an earlier one
//! failed, so a parse error or a cancelled resolution leaves the working tree
//! untouched.

use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::ResolutionOptions;
use crate::error::Error;
use crate::exit_codes;
use crate::lock::LockError;
use crate::planner::{self, OperationBatch};
use crate::resolver::{self, PathError, ResolutionContext, ResolveError, SelectionSet};
use crate::spec::{self, ParseError};
use crate::store::VersionStore;

/// Whether a run may touch the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Resolve and plan only.
    DryRun,
    /// Resolve, plan and apply under the tree lock.
    Apply,
}

/// What a successful run decided and did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub selection: SelectionSet,
    pub batch: OperationBatch,
    /// Whether `batch` was applied to the store.
    pub applied: bool,
}

/// Result of a run.
#[derive(Debug)]
pub enum Outcome {
    Success(RunReport),
    ParseFailure(ParseError),
    ResolutionFailure(Vec<PathError>),
    /// The store could not list its state or apply the batch.
    StoreFailure(Error),
    TreeBusy,
    Cancelled,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success(_) => exit_codes::SUCCESS,
            Outcome::ParseFailure(_) => exit_codes::PARSE_FAILURE,
            Outcome::ResolutionFailure(_) => exit_codes::RESOLUTION_FAILURE,
            Outcome::StoreFailure(_) => exit_codes::STORE_FAILURE,
            Outcome::TreeBusy => exit_codes::TREE_BUSY,
            Outcome::Cancelled => exit_codes::CANCELLED,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Whether running again unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::TreeBusy | Outcome::Cancelled)
    }
}

/// Execute one run of `spec_text` against `store`.
pub fn execute(
    spec_text: &str,
    store: &mut dyn VersionStore,
    options: ResolutionOptions,
    mode: Mode,
    cancel: &CancelToken,
) -> Outcome {
    let rules = match spec::parse(spec_text) {
        Ok(rules) => rules,
        Err(e) => return Outcome::ParseFailure(e),
    };
    debug!("Parsed {} rule(s)", rules.len());

    // Held until the function returns.
    let _guard = match mode {
        Mode::Apply => match store.lock() {
            Ok(guard) => Some(guard),
            Err(LockError::AlreadyLocked) => return Outcome::TreeBusy,
            Err(e) => return Outcome::StoreFailure(e.into()),
        },
        Mode::DryRun => None,
    };

    let inventory = match store.inventory() {
        Ok(inventory) => inventory,
        Err(e) => return Outcome::StoreFailure(e),
    };

    let ctx = ResolutionContext::new(&rules, options, cancel.clone());
    let selection = match resolver::resolve(&ctx, &inventory.universe(), &inventory) {
        Ok(selection) => selection,
        Err(ResolveError::Failed(errors)) => return Outcome::ResolutionFailure(errors),
        Err(ResolveError::Cancelled) => return Outcome::Cancelled,
    };

    let current = match store.current_state() {
        Ok(current) => current,
        Err(e) => return Outcome::StoreFailure(e),
    };
    let batch = planner::plan(&selection, &current);

    if cancel.is_cancelled() {
        info!("Run cancelled before applying {} operation(s)", batch.len());
        return Outcome::Cancelled;
    }

    let applied = match mode {
        Mode::DryRun => false,
        Mode::Apply => {
            if let Err(e) = store.apply(batch.clone()) {
                warn!("{}", e);
                return Outcome::StoreFailure(e.into());
            }
            info!(
                "Applied {} fetch(es) and {} removal(s)",
                batch.fetch_count(),
                batch.remove_count()
            );
            true
        }
    };

    Outcome::Success(RunReport {
        selection,
        batch,
        applied,
    })
}
