//! # Spec Resolution
//!
//! The resolver decides, for every path of a universe, which rule applies and
//! what that rule selects. The result is a [`SelectionSet`]: a total mapping
//! from path to `Resolved(revision)` or `Excluded`. A selecting rule whose
//! revision does not contain the path yields `Absent`, which materializes
//! nothing, the same as an exclusion.
//!
//! ## Precedence
//!
//! Rules are tried in authored order and the first rule whose pattern matches
//! a path decides its outcome. Rules are never sorted by specificity or
//! deduplicated. A path matched by no rule is excluded.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use configspec::cancel::CancelToken;
//! use configspec::config::ResolutionOptions;
//! use configspec::inventory::RepositoryInventory;
//! use configspec::resolver::{self, ResolutionContext, Selection};
//! use configspec::spec;
//!
//! let rules = spec::parse("/src/** BRANCH main\n/src/gen/** EXCLUDE\n").unwrap();
//! let mut inventory = RepositoryInventory::new();
//! inventory.add_revision("/src/gen/x.rs", "c1", "main", Utc.timestamp_opt(1, 0).unwrap());
//!
//! let ctx = ResolutionContext::new(&rules, ResolutionOptions::default(), CancelToken::new());
//! let selection = resolver::resolve(&ctx, &inventory.universe(), &inventory).unwrap();
//!
//! // The branch rule comes first, so it wins over the later exclusion.
//! assert!(matches!(selection.get("/src/gen/x.rs"), Some(Selection::Resolved { .. })));
//! ```
//!
//! ## Failures
//!
//! A failed revision lookup only affects its own path. By default every
//! failure is collected and reported together; with `stop_on_first_error` the
//! first failure (in path order) is returned alone.
//!
//! ## Concurrency
//!
//! Paths are resolved in parallel on the rayon pool. Inputs are read-only and
//! each path produces exactly one entry, so the only synchronization is the
//! join before the selection set is assembled. The cancel token is polled
//! before each path and once more after the join; a cancelled run returns
//! [`ResolveError::Cancelled`] and no selection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info};
use rayon::prelude::*;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::config::ResolutionOptions;
use crate::inventory::{RepositoryInventory, RevisionId};
use crate::path::normalize;
use crate::revision::{self, ResolutionErrorKind, Version};
use crate::spec::{Action, Rule, VersionQualifier};

/// Everything a resolution run needs besides its inputs.
#[derive(Debug, Clone)]
pub struct ResolutionContext<'a> {
    pub rules: &'a [Rule],
    pub options: ResolutionOptions,
    pub cancel: CancelToken,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(rules: &'a [Rule], options: ResolutionOptions, cancel: CancelToken) -> Self {
        Self {
            rules,
            options,
            cancel,
        }
    }
}

/// Outcome for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Resolved {
        revision: RevisionId,
        /// Line of the rule that selected the revision.
        rule_line: usize,
    },
    Excluded {
        /// Line of the excluding rule, or `None` when no rule matched.
        rule_line: Option<usize>,
    },
    /// The selected revision deletes the path or does not contain it.
    Absent {
        revision: RevisionId,
        rule_line: usize,
    },
}

impl Selection {
    /// The revision to materialize, if any.
    pub fn revision(&self) -> Option<&RevisionId> {
        match self {
            Selection::Resolved { revision, .. } => Some(revision),
            Selection::Excluded { .. } | Selection::Absent { .. } => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Selection::Excluded { .. })
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Selection::Absent { .. })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Resolved {
                revision,
                rule_line,
            } => write!(f, "{} (line {})", revision, rule_line),
            Selection::Excluded {
                rule_line: Some(line),
            } => write!(f, "excluded (line {})", line),
            Selection::Excluded { rule_line: None } => f.write_str("excluded (no matching rule)"),
            Selection::Absent {
                revision,
                rule_line,
            } => write!(f, "absent at {} (line {})", revision, rule_line),
        }
    }
}

/// Total mapping from path to selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    entries: BTreeMap<String, Selection>,
}

impl SelectionSet {
    pub fn get(&self, path: &str) -> Option<&Selection> {
        self.entries.get(path)
    }

    /// Entries in ascending path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Selection)> {
        self.entries.iter()
    }

    /// Paths with a resolved revision.
    pub fn resolved(&self) -> impl Iterator<Item = (&String, &RevisionId)> {
        self.entries
            .iter()
            .filter_map(|(path, selection)| selection.revision().map(|rev| (path, rev)))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn excluded_count(&self) -> usize {
        self.entries.values().filter(|s| s.is_excluded()).count()
    }

    pub fn absent_count(&self) -> usize {
        self.entries.values().filter(|s| s.is_absent()).count()
    }
}

impl FromIterator<(String, Selection)> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = (String, Selection)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A failed revision lookup, attributed to one path and one rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind} (line {rule_line}: {qualifier})")]
pub struct PathError {
    pub path: String,
    pub rule_line: usize,
    pub qualifier: VersionQualifier,
    pub kind: ResolutionErrorKind,
}

/// Why a resolution run produced no selection set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{} path(s) could not be resolved", .0.len())]
    Failed(Vec<PathError>),

    #[error("resolution was cancelled")]
    Cancelled,
}

/// The first rule in authored order whose pattern matches `path`.
pub fn first_match<'r>(rules: &'r [Rule], path: &str, case_sensitive: bool) -> Option<&'r Rule> {
    rules
        .iter()
        .find(|rule| rule.pattern.matches(path, case_sensitive))
}

/// Decide the outcome for a single path.
pub fn resolve_path(
    ctx: &ResolutionContext<'_>,
    path: &str,
    inventory: &RepositoryInventory,
) -> Result<Selection, PathError> {
    let rule = match first_match(ctx.rules, path, ctx.options.case_sensitive_paths) {
        Some(rule) => rule,
        None => return Ok(Selection::Excluded { rule_line: None }),
    };

    match rule.action {
        Action::Exclude => Ok(Selection::Excluded {
            rule_line: Some(rule.source_line),
        }),
        Action::Select => revision::resolve(path, &rule.qualifier, inventory)
            .map(|version| match version {
                Version::Present(revision) => Selection::Resolved {
                    revision,
                    rule_line: rule.source_line,
                },
                Version::Absent(revision) => Selection::Absent {
                    revision,
                    rule_line: rule.source_line,
                },
            })
            .map_err(|kind| PathError {
                path: path.to_string(),
                rule_line: rule.source_line,
                qualifier: rule.qualifier.clone(),
                kind,
            }),
    }
}

/// Resolve every path of `universe`.
///
/// Paths are normalized and deduplicated first, so the returned set has one
/// entry per distinct logical path.
pub fn resolve(
    ctx: &ResolutionContext<'_>,
    universe: &[String],
    inventory: &RepositoryInventory,
) -> Result<SelectionSet, ResolveError> {
    let paths: Vec<String> = universe
        .iter()
        .map(|path| normalize(path))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    info!(
        "Resolving {} path(s) against {} rule(s)",
        paths.len(),
        ctx.rules.len()
    );

    let outcomes = if ctx.options.stop_on_first_error {
        resolve_sequential(ctx, &paths, inventory)?
    } else {
        resolve_parallel(ctx, &paths, inventory)?
    };

    let mut selection = SelectionSet::default();
    let mut errors = Vec::new();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(chosen) => {
                debug!("{} -> {}", path, chosen);
                selection.entries.insert(path, chosen);
            }
            Err(err) => errors.push(err),
        }
    }

    if !errors.is_empty() {
        return Err(ResolveError::Failed(errors));
    }

    Ok(selection)
}

type Outcome = (String, Result<Selection, PathError>);

fn resolve_parallel(
    ctx: &ResolutionContext<'_>,
    paths: &[String],
    inventory: &RepositoryInventory,
) -> Result<Vec<Outcome>, ResolveError> {
    let outcomes: Vec<Outcome> = paths
        .par_iter()
        .filter_map(|path| {
            if ctx.cancel.is_cancelled() {
                return None;
            }
            Some((path.clone(), resolve_path(ctx, path, inventory)))
        })
        .collect();

    if ctx.cancel.is_cancelled() {
        info!("Resolution cancelled, discarding {} result(s)", outcomes.len());
        return Err(ResolveError::Cancelled);
    }

    Ok(outcomes)
}

fn resolve_sequential(
    ctx: &ResolutionContext<'_>,
    paths: &[String],
    inventory: &RepositoryInventory,
) -> Result<Vec<Outcome>, ResolveError> {
    let mut outcomes = Vec::with_capacity(paths.len());

    for path in paths {
        if ctx.cancel.is_cancelled() {
            info!("Resolution cancelled at {}", path);
            return Err(ResolveError::Cancelled);
        }
        match resolve_path(ctx, path, inventory) {
            Ok(selection) => outcomes.push((path.clone(), Ok(selection))),
            Err(err) => {
                debug!("Stopping at first error: {}", err);
                return Err(ResolveError::Failed(vec![err]));
            }
        }
    }

    Ok(outcomes)
}
