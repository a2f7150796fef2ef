//! # Config Spec Library
//!
//! Decides, for every path tracked by one or more git repositories inside a
//! working tree, which revision of that path should be materialized. The
//! decision is driven by a *config spec*: an ordered list of rules in the
//! style of ClearCase, each pairing a path pattern with a version qualifier
//! (`BRANCH`, `TAG`, `REVISION`, `LATEST` or `ASOF`) or an exclusion.
//!
//! ## Quick Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use configspec::cancel::CancelToken;
//! use configspec::config::ResolutionOptions;
//! use configspec::inventory::RepositoryInventory;
//! use configspec::orchestrator::{self, Mode, Outcome};
//! use configspec::store::MemoryStore;
//!
//! let mut inventory = RepositoryInventory::new();
//! inventory
//!     .add_revision("/docs/readme.md", "a1", "main", Utc.timestamp_opt(10, 0).unwrap())
//!     .add_revision("/other.txt", "b1", "main", Utc.timestamp_opt(20, 0).unwrap())
//!     .add_tag("release-1", "a1");
//! let mut store = MemoryStore::new(inventory);
//!
//! let outcome = orchestrator::execute(
//!     "/docs/** TAG release-1\n",
//!     &mut store,
//!     ResolutionOptions::default(),
//!     Mode::Apply,
//!     &CancelToken::new(),
//! );
//!
//! match outcome {
//!     Outcome::Success(report) => {
//!         assert_eq!(report.batch.fetch_count(), 1);
//!         assert!(report.selection.get("/other.txt").unwrap().is_excluded());
//!     }
//!     other => panic!("{:?}", other),
//! }
//! ```
//!
//! ## Core Concepts
//!
//! - **Rules (`spec`)**: parsing of config spec text into ordered rules.
//! - **Patterns (`path`)**: logical path normalization and glob matching.
//! - **Inventory (`inventory`)**: per-path revision history and tags.
//! - **Resolution (`revision`, `resolver`)**: first-match-wins rule
//!   selection and qualifier lookup for every path, in parallel.
//! - **Planning (`planner`)**: the minimal ordered batch of fetches and
//!   removals that brings a tree to the selected state.
//! - **Stores (`store`, `git_store`, `lock`)**: the boundary that supplies
//!   inventories and applies batches, guarded by an exclusive tree lock.
//!
//! ## Execution Flow
//!
//! [`orchestrator::execute`] parses, locks, resolves, plans and applies, and
//! reports exactly one [`orchestrator::Outcome`] per run.

pub mod cancel;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod git_store;
pub mod inventory;
pub mod lock;
pub mod orchestrator;
pub mod output;
pub mod path;
pub mod planner;
pub mod resolver;
pub mod revision;
pub mod spec;
pub mod store;

#[cfg(test)]
mod resolver_proptest;
