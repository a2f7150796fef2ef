//! Evaluation of a version qualifier for a single path
//!
//! This is the only place where resolution can fail for lack of history. Each
//! failure is about exactly one path; the caller attaches the rule that was
//! being evaluated.
//!
//! "Newest" always means the greatest `(created, id)` pair, so two revisions
//! with the same timestamp are still ordered deterministically.
//!
//! A qualifier can designate a revision at which the path does not exist:
//! the newest revision on a branch may be the one that deleted it, and a tag
//! may point at a tree that does not contain it. That is not a failure; the
//! result is [`Version::Absent`] and nothing is materialized for the path.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::inventory::{RepositoryInventory, RevisionId, RevisionRecord};
use crate::spec::VersionQualifier;

/// Why a qualifier could not be turned into a revision for a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionErrorKind {
    #[error("no revision on branch '{0}' touches this path")]
    NoSuchBranch(String),

    #[error("tag '{0}' does not exist")]
    NoSuchTag(String),

    #[error("revision '{0}' does not touch this path")]
    NoSuchRevision(RevisionId),

    #[error("no revision at or before {}", .0.to_rfc3339())]
    NoHistoryAtTime(DateTime<Utc>),

    #[error("path has no recorded history")]
    NoHistory,
}

/// What a qualifier designates for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Version {
    /// The path exists at this revision.
    Present(RevisionId),
    /// The path does not exist at this revision.
    Absent(RevisionId),
}

impl Version {
    pub fn id(&self) -> &RevisionId {
        match self {
            Version::Present(id) | Version::Absent(id) => id,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Version::Present(_))
    }
}

/// Resolve `qualifier` for `path` against `inventory`.
///
/// `path` must already be normalized.
pub fn resolve(
    path: &str,
    qualifier: &VersionQualifier,
    inventory: &RepositoryInventory,
) -> Result<Version, ResolutionErrorKind> {
    let history = || {
        inventory
            .history(path)
            .filter(|history| !history.is_empty())
            .ok_or(ResolutionErrorKind::NoHistory)
    };

    let found = match qualifier {
        VersionQualifier::Tag(name) => {
            let tag = inventory
                .tag(name, path)
                .ok_or_else(|| ResolutionErrorKind::NoSuchTag(name.clone()))?;
            let id = tag.revision.clone();
            return Ok(if tag.contains(path) {
                Version::Present(id)
            } else {
                Version::Absent(id)
            });
        }
        VersionQualifier::Branch(name) => newest(
            history()?
                .iter()
                .filter(|record| record.branches.contains(name.as_str())),
        )
        .ok_or_else(|| ResolutionErrorKind::NoSuchBranch(name.clone()))?,
        VersionQualifier::Revision(id) => history()?
            .iter()
            .find(|record| &record.id == id)
            .ok_or_else(|| ResolutionErrorKind::NoSuchRevision(id.clone()))?,
        VersionQualifier::Latest => {
            newest(history()?.iter()).ok_or(ResolutionErrorKind::NoHistory)?
        }
        VersionQualifier::AsOf(at) => {
            newest(history()?.iter().filter(|record| record.created <= *at))
                .ok_or(ResolutionErrorKind::NoHistoryAtTime(*at))?
        }
    };

    let id = found.id.clone();
    Ok(if found.deleted {
        Version::Absent(id)
    } else {
        Version::Present(id)
    })
}

fn newest<'a>(records: impl Iterator<Item = &'a RevisionRecord>) -> Option<&'a RevisionRecord> {
    records.max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn inventory() -> RepositoryInventory {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("/src/lib.rs", "a1", "main", ts(100))
            .add_revision("/src/lib.rs", "b2", "main", ts(200))
            .add_revision("/src/lib.rs", "c3", "feature", ts(300))
            .add_revision("/src/lib.rs", "b2", "feature", ts(200))
            .add_tag("v1", "a1");
        inv
    }

    #[test]
    fn test_branch_selects_tip_touching_path() {
        let inv = inventory();
        let q = VersionQualifier::Branch("main".into());
        assert_eq!(resolve("/src/lib.rs", &q, &inv).unwrap().id().as_str(), "b2");

        let q = VersionQualifier::Branch("feature".into());
        assert_eq!(resolve("/src/lib.rs", &q, &inv).unwrap().id().as_str(), "c3");
    }

    #[test]
    fn test_branch_missing() {
        let inv = inventory();
        let q = VersionQualifier::Branch("release".into());
        assert_eq!(
            resolve("/src/lib.rs", &q, &inv).unwrap_err(),
            ResolutionErrorKind::NoSuchBranch("release".into())
        );
    }

    #[test]
    fn test_tag() {
        let inv = inventory();
        let q = VersionQualifier::Tag("v1".into());
        assert_eq!(resolve("/src/lib.rs", &q, &inv).unwrap().id().as_str(), "a1");

        let q = VersionQualifier::Tag("v9".into());
        assert_eq!(
            resolve("/src/lib.rs", &q, &inv).unwrap_err(),
            ResolutionErrorKind::NoSuchTag("v9".into())
        );
    }

    #[test]
    fn test_revision() {
        let inv = inventory();
        let q = VersionQualifier::Revision("a1".into());
        assert_eq!(resolve("/src/lib.rs", &q, &inv).unwrap().id().as_str(), "a1");

        let q = VersionQualifier::Revision("zz".into());
        assert_eq!(
            resolve("/src/lib.rs", &q, &inv).unwrap_err(),
            ResolutionErrorKind::NoSuchRevision("zz".into())
        );
    }

    #[test]
    fn test_latest_across_branches() {
        let inv = inventory();
        assert_eq!(
            resolve("/src/lib.rs", &VersionQualifier::Latest, &inv)
                .unwrap()
                .id()
                .as_str(),
            "c3"
        );
    }

    #[test]
    fn test_latest_tie_break_is_deterministic() {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("/a", "x", "main", ts(5))
            .add_revision("/a", "y", "other", ts(5));
        for _ in 0..10 {
            assert_eq!(
                resolve("/a", &VersionQualifier::Latest, &inv)
                    .unwrap()
                    .id()
                    .as_str(),
                "y"
            );
        }
    }

    #[test]
    fn test_as_of() {
        let inv = inventory();
        let q = VersionQualifier::AsOf(ts(250));
        assert_eq!(resolve("/src/lib.rs", &q, &inv).unwrap().id().as_str(), "b2");

        let q = VersionQualifier::AsOf(ts(200));
        assert_eq!(resolve("/src/lib.rs", &q, &inv).unwrap().id().as_str(), "b2");

        let q = VersionQualifier::AsOf(ts(50));
        assert_eq!(
            resolve("/src/lib.rs", &q, &inv).unwrap_err(),
            ResolutionErrorKind::NoHistoryAtTime(ts(50))
        );
    }

    #[test]
    fn test_deletion_at_branch_tip_is_absent() {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("/old.txt", "a1", "main", ts(100))
            .add_deletion("/old.txt", "b2", "main", ts(200))
            .add_revision("/old.txt", "a1", "release", ts(100));

        let q = VersionQualifier::Branch("main".into());
        assert_eq!(
            resolve("/old.txt", &q, &inv).unwrap(),
            Version::Absent("b2".into())
        );
        assert_eq!(
            resolve("/old.txt", &VersionQualifier::Latest, &inv).unwrap(),
            Version::Absent("b2".into())
        );

        // Before the deletion, and on a branch without it, the file is there.
        let q = VersionQualifier::AsOf(ts(150));
        assert_eq!(
            resolve("/old.txt", &q, &inv).unwrap(),
            Version::Present("a1".into())
        );
        let q = VersionQualifier::Branch("release".into());
        assert!(resolve("/old.txt", &q, &inv).unwrap().is_present());

        let q = VersionQualifier::Revision("b2".into());
        assert!(!resolve("/old.txt", &q, &inv).unwrap().is_present());
    }

    #[test]
    fn test_readded_path_is_present() {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("/a", "r1", "main", ts(1))
            .add_deletion("/a", "r2", "main", ts(2))
            .add_revision("/a", "r3", "main", ts(3));
        let q = VersionQualifier::Branch("main".into());
        assert_eq!(resolve("/a", &q, &inv).unwrap(), Version::Present("r3".into()));
    }

    #[test]
    fn test_tag_without_path_is_absent() {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("/a.txt", "r1", "main", ts(1))
            .add_revision("/new.txt", "r2", "main", ts(2))
            .add_tag_with_paths("/", "v1", "r1", ["/a.txt"]);

        let q = VersionQualifier::Tag("v1".into());
        assert_eq!(resolve("/a.txt", &q, &inv).unwrap(), Version::Present("r1".into()));
        assert_eq!(resolve("/new.txt", &q, &inv).unwrap(), Version::Absent("r1".into()));
    }

    #[test]
    fn test_unknown_path() {
        let inv = inventory();
        assert_eq!(
            resolve("/nope", &VersionQualifier::Latest, &inv).unwrap_err(),
            ResolutionErrorKind::NoHistory
        );
    }
}
