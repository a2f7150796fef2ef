//! # Version Store Boundary
//!
//! A [`VersionStore`] is the only component that touches real state. It
//! supplies the revision inventory and the current working tree state, and
//! applies operation batches.
//!
//! ## Design
//!
//! The trait separates the resolution engine from the backend that executes
//! its decisions, the same way repository access is abstracted elsewhere in
//! the crate:
//!
//! - [`MemoryStore`] keeps everything in memory. It backs dry runs, JSON
//!   inventories given on the command line, and tests.
//! - [`crate::git_store::GitStore`] drives the `git` command line against one
//!   or more repositories inside a working tree.
//!
//! ## Applying batches
//!
//! `apply` executes operations strictly in order. When an operation fails the
//! store stops and reports which operations were applied, which one failed
//! and which were never attempted. Nothing is rolled back: the current state
//! reflects the applied prefix, so planning again resumes from there.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::error::Result;
use crate::inventory::RepositoryInventory;
use crate::lock::{LockError, TreeLock};
use crate::planner::{CurrentState, Operation, OperationBatch};

/// A batch stopped part-way through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to {failed}: {message} ({} applied, {} not attempted)", applied.len(), remaining.len())]
pub struct StoreError {
    /// Operations that completed before the failure.
    pub applied: Vec<Operation>,
    /// The operation that failed.
    pub failed: Operation,
    /// Operations after the failed one, never attempted.
    pub remaining: Vec<Operation>,
    pub message: String,
}

impl StoreError {
    /// The sub-batch that did not apply: the failed operation and everything after it.
    pub fn unapplied(&self) -> OperationBatch {
        let mut operations = vec![self.failed.clone()];
        operations.extend(self.remaining.iter().cloned());
        OperationBatch::new(operations)
    }
}

/// Backend that owns a working tree.
pub trait VersionStore {
    /// Revision history of every path the store can materialize.
    fn inventory(&self) -> Result<RepositoryInventory>;

    /// Revision currently materialized at each path.
    fn current_state(&self) -> Result<CurrentState>;

    /// Take the exclusive working tree lock.
    fn lock(&self) -> std::result::Result<TreeLock, LockError>;

    /// Apply `batch` in order.
    fn apply(&mut self, batch: OperationBatch) -> std::result::Result<(), StoreError>;

    /// Human-readable form of what `op` would do, for dry runs.
    fn describe(&self, op: &Operation) -> String {
        op.to_string()
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inventory: RepositoryInventory,
    state: CurrentState,
    busy: Arc<AtomicBool>,
    fail_on: Option<String>,
}

impl MemoryStore {
    pub fn new(inventory: RepositoryInventory) -> Self {
        Self {
            inventory,
            ..Self::default()
        }
    }

    /// Load an inventory from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let parsed: RepositoryInventory = serde_json::from_str(&content)?;
        // Rebuild so every path goes through normalization.
        let mut inventory = RepositoryInventory::new();
        inventory.extend(parsed);
        Ok(Self::new(inventory))
    }

    /// Start from an already materialized state.
    pub fn with_state(mut self, state: CurrentState) -> Self {
        self.state = state;
        self
    }

    /// Fault injection: any operation on `path` fails.
    pub fn fail_on(mut self, path: &str) -> Self {
        self.fail_on = Some(path.to_string());
        self
    }

    pub fn state(&self) -> &CurrentState {
        &self.state
    }
}

impl VersionStore for MemoryStore {
    fn inventory(&self) -> Result<RepositoryInventory> {
        Ok(self.inventory.clone())
    }

    fn current_state(&self) -> Result<CurrentState> {
        Ok(self.state.clone())
    }

    fn lock(&self) -> std::result::Result<TreeLock, LockError> {
        TreeLock::acquire_flag(&self.busy)
    }

    fn apply(&mut self, batch: OperationBatch) -> std::result::Result<(), StoreError> {
        let mut applied = Vec::new();
        let mut pending = batch.into_iter();

        while let Some(op) = pending.next() {
            if self.fail_on.as_deref() == Some(op.path()) {
                return Err(StoreError {
                    applied,
                    failed: op,
                    remaining: pending.collect(),
                    message: "injected failure".to_string(),
                });
            }

            debug!("memory store: {}", op);
            match &op {
                Operation::Fetch { path, revision } => {
                    self.state.insert(path.clone(), revision.clone());
                }
                Operation::Remove { path } => {
                    self.state.remove(path);
                }
            }
            applied.push(op);
        }

        Ok(())
    }
}
