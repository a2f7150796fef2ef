//! # Operation Planning
//!
//! Turns a [`SelectionSet`] into the minimal batch of operations that brings
//! a working tree from its current state to the selected one.
//!
//! For every path:
//!
//! - excluded or absent at the selected revision, and currently materialized:
//!   `Remove`;
//! - resolved to `r` and currently absent or at another revision: `Fetch(r)`;
//! - otherwise nothing.
//!
//! Paths that are materialized but no longer part of the selection's universe
//! are removed too. The planner does no I/O, so planning the same inputs twice
//! gives the same batch, and planning against a tree that already matches
//! gives an empty one.
//!
//! ## Ordering
//!
//! All removals come before all fetches, so a file can be replaced by a
//! directory of the same name (or the other way around) without a transient
//! collision. Removals run deepest path first; fetches run in ascending path
//! order.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::inventory::RevisionId;
use crate::path::depth;
use crate::resolver::{Selection, SelectionSet};

/// Revision currently materialized at each path.
pub type CurrentState = BTreeMap<String, RevisionId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Fetch,
    Remove,
}

/// One retrieval or removal against the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Fetch { path: String, revision: RevisionId },
    Remove { path: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Fetch { .. } => OperationKind::Fetch,
            Operation::Remove { .. } => OperationKind::Remove,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Operation::Fetch { path, .. } | Operation::Remove { path } => path,
        }
    }

    pub fn revision(&self) -> Option<&RevisionId> {
        match self {
            Operation::Fetch { revision, .. } => Some(revision),
            Operation::Remove { .. } => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Fetch { path, revision } => write!(f, "fetch {} @ {}", path, revision),
            Operation::Remove { path } => write!(f, "remove {}", path),
        }
    }
}

/// Ordered operations produced by [`plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationBatch {
    operations: Vec<Operation>,
}

impl OperationBatch {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn fetch_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.kind() == OperationKind::Fetch)
            .count()
    }

    pub fn remove_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.kind() == OperationKind::Remove)
            .count()
    }
}

impl IntoIterator for OperationBatch {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

impl<'a> IntoIterator for &'a OperationBatch {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Diff `selection` against `current` and emit the ordered batch.
pub fn plan(selection: &SelectionSet, current: &CurrentState) -> OperationBatch {
    let mut removes: Vec<String> = Vec::new();
    let mut fetches: Vec<Operation> = Vec::new();

    for (path, chosen) in selection.iter() {
        match chosen {
            Selection::Excluded { .. } | Selection::Absent { .. } => {
                if current.contains_key(path) {
                    removes.push(path.clone());
                }
            }
            Selection::Resolved { revision, .. } => {
                if current.get(path) != Some(revision) {
                    fetches.push(Operation::Fetch {
                        path: path.clone(),
                        revision: revision.clone(),
                    });
                }
            }
        }
    }

    for path in current.keys() {
        if !selection.contains(path) {
            debug!("{} is no longer in the universe, removing", path);
            removes.push(path.clone());
        }
    }

    removes.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| a.cmp(b)));

    let mut operations: Vec<Operation> = removes
        .into_iter()
        .map(|path| Operation::Remove { path })
        .collect();
    operations.extend(fetches);

    debug!("Planned {} operation(s)", operations.len());
    OperationBatch { operations }
}

/// The state a tree reaches after `batch` is applied to `current`.
pub fn project(current: &CurrentState, batch: &OperationBatch) -> CurrentState {
    let mut next = current.clone();
    for op in batch {
        match op {
            Operation::Fetch { path, revision } => {
                next.insert(path.clone(), revision.clone());
            }
            Operation::Remove { path } => {
                next.remove(path);
            }
        }
    }
    next
}
