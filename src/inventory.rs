//! Read-only view of the revision history available to the resolver
//!
//! A `RepositoryInventory` lists, for every known logical path, the revisions
//! that touched it together with the branches they are reachable from and
//! their creation time. A revision that deleted the path is kept as a
//! deletion record, so "newest revision touching the path" can be a deletion.
//!
//! Tags are recorded per scope: a scope is the logical root of the repository
//! that owns the tag, so the same tag name can point at different revisions in
//! different repositories. A tag may also list the paths present in its tree;
//! without that list it is taken to contain every path.
//!
//! The inventory is built by a `VersionStore` (or by hand in tests) and is
//! never mutated by resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path::{self, is_within};

/// Immutable identifier of one revision (a commit id for git).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RevisionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One revision that touched a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: RevisionId,
    /// Branches this revision is reachable from.
    #[serde(default)]
    pub branches: BTreeSet<String>,
    pub created: DateTime<Utc>,
    /// The revision removed the path.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// A tag, valid for paths under `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(default = "root_scope")]
    pub scope: String,
    pub revision: RevisionId,
    /// Paths present in the tagged tree, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<BTreeSet<String>>,
}

impl TagRecord {
    /// Whether `path` exists in the tagged tree.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.as_ref().map_or(true, |paths| paths.contains(path))
    }
}

fn root_scope() -> String {
    "/".to_string()
}

/// Per-path revision history plus tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInventory {
    #[serde(default)]
    paths: BTreeMap<String, Vec<RevisionRecord>>,
    #[serde(default)]
    tags: BTreeMap<String, Vec<TagRecord>>,
}

impl RepositoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that revision `id`, reachable from `branch`, touched `path`.
    ///
    /// Recording the same revision again for the same path merges the branch
    /// into the existing record instead of duplicating it.
    pub fn add_revision(
        &mut self,
        path: &str,
        id: impl Into<RevisionId>,
        branch: &str,
        created: DateTime<Utc>,
    ) -> &mut Self {
        self.record(path, id.into(), branch, created, false)
    }

    /// Record that revision `id`, reachable from `branch`, deleted `path`.
    pub fn add_deletion(
        &mut self,
        path: &str,
        id: impl Into<RevisionId>,
        branch: &str,
        created: DateTime<Utc>,
    ) -> &mut Self {
        self.record(path, id.into(), branch, created, true)
    }

    fn record(
        &mut self,
        path: &str,
        id: RevisionId,
        branch: &str,
        created: DateTime<Utc>,
        deleted: bool,
    ) -> &mut Self {
        let history = self.paths.entry(path::normalize(path)).or_default();

        match history.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.branches.insert(branch.to_string());
            }
            None => history.push(RevisionRecord {
                id,
                branches: BTreeSet::from([branch.to_string()]),
                created,
                deleted,
            }),
        }
        self
    }

    /// Record a repository-wide tag.
    pub fn add_tag(&mut self, name: &str, revision: impl Into<RevisionId>) -> &mut Self {
        self.add_scoped_tag("/", name, revision)
    }

    /// Record a tag that only applies to paths under `scope`.
    pub fn add_scoped_tag(
        &mut self,
        scope: &str,
        name: &str,
        revision: impl Into<RevisionId>,
    ) -> &mut Self {
        self.insert_tag(
            name,
            TagRecord {
                scope: scope.to_string(),
                revision: revision.into(),
                paths: None,
            },
        )
    }

    /// Record a scoped tag together with the paths its tree contains.
    pub fn add_tag_with_paths<I, S>(
        &mut self,
        scope: &str,
        name: &str,
        revision: impl Into<RevisionId>,
        paths: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
        self.insert_tag(
            name,
            TagRecord {
                scope: scope.to_string(),
                revision: revision.into(),
                paths: Some(paths),
            },
        )
    }

    fn insert_tag(&mut self, name: &str, mut tag: TagRecord) -> &mut Self {
        tag.scope = path::normalize(&tag.scope);
        tag.paths = tag
            .paths
            .take()
            .map(|paths| paths.iter().map(|p| path::normalize(p)).collect());
        let records = self.tags.entry(name.to_string()).or_default();
        records.retain(|record| record.scope != tag.scope);
        records.push(tag);
        self
    }

    /// Every known path, in ascending order.
    pub fn universe(&self) -> Vec<String> {
        self.paths.keys().cloned().collect()
    }

    /// Revisions that touched `path`, if the path is known.
    pub fn history(&self, path: &str) -> Option<&[RevisionRecord]> {
        self.paths.get(path).map(Vec::as_slice)
    }

    /// The tag record that applies to `path`: the one with the longest scope
    /// containing it.
    pub fn tag(&self, name: &str, path: &str) -> Option<&TagRecord> {
        self.tags
            .get(name)?
            .iter()
            .filter(|record| is_within(path, &record.scope))
            .max_by_key(|record| path::depth(&record.scope))
    }

    /// Revision a tag designates for `path`.
    pub fn tag_for(&self, name: &str, path: &str) -> Option<&RevisionId> {
        self.tag(name, path).map(|record| &record.revision)
    }

    /// Merge another inventory into this one.
    pub fn extend(&mut self, other: RepositoryInventory) {
        for (path, history) in other.paths {
            let target = self.paths.entry(path::normalize(&path)).or_default();
            for record in history {
                match target.iter_mut().find(|existing| existing.id == record.id) {
                    Some(existing) => existing.branches.extend(record.branches),
                    None => target.push(record),
                }
            }
        }
        for (name, records) in other.tags {
            for record in records {
                self.insert_tag(&name, record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_add_revision_normalizes_and_merges_branches() {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("docs/readme.md", "r1", "main", ts(10))
            .add_revision("/docs/readme.md", "r1", "release", ts(10));

        let history = inv.history("/docs/readme.md").unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].branches.contains("main"));
        assert!(history[0].branches.contains("release"));
    }

    #[test]
    fn test_universe_is_sorted() {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("/b.txt", "r1", "main", ts(1))
            .add_revision("/a.txt", "r1", "main", ts(1));
        assert_eq!(inv.universe(), vec!["/a.txt", "/b.txt"]);
        assert_eq!(inv.len(), 2);
    }

    #[test]
    fn test_scoped_tags_prefer_longest_scope() {
        let mut inv = RepositoryInventory::new();
        inv.add_tag("v1", "root-rev")
            .add_scoped_tag("/libs/core", "v1", "core-rev");

        assert_eq!(inv.tag_for("v1", "/libs/core/src/lib.rs").unwrap().as_str(), "core-rev");
        assert_eq!(inv.tag_for("v1", "/README.md").unwrap().as_str(), "root-rev");
        assert!(inv.tag_for("v2", "/README.md").is_none());
    }

    #[test]
    fn test_scoped_tag_without_root_does_not_leak() {
        let mut inv = RepositoryInventory::new();
        inv.add_scoped_tag("/libs/core", "v1", "core-rev");
        assert!(inv.tag_for("v1", "/libs/other/a.rs").is_none());
    }

    #[test]
    fn test_deletions_are_kept_as_records() {
        let mut inv = RepositoryInventory::new();
        inv.add_revision("/old.txt", "r1", "main", ts(1))
            .add_deletion("/old.txt", "r2", "main", ts(2));

        let history = inv.history("/old.txt").unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].deleted);
        assert!(history[1].deleted);
        assert_eq!(inv.universe(), vec!["/old.txt"]);
    }

    #[test]
    fn test_tag_contents() {
        let mut inv = RepositoryInventory::new();
        inv.add_tag_with_paths("/", "v1", "r1", ["a.txt", "/docs//b.md"])
            .add_tag("v2", "r2");

        let v1 = inv.tag("v1", "/a.txt").unwrap();
        assert!(v1.contains("/a.txt"));
        assert!(v1.contains("/docs/b.md"));
        assert!(!v1.contains("/new.txt"));
        assert!(inv.tag("v2", "/new.txt").unwrap().contains("/new.txt"));
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "paths": {
                "/a.txt": [
                    {"id": "r1", "branches": ["main"], "created": "2024-01-01T00:00:00Z"}
                ]
            },
            "tags": { "v1": [ {"revision": "r1"} ] }
        }"#;
        let inv: RepositoryInventory = serde_json::from_str(json).unwrap();
        assert_eq!(inv.universe(), vec!["/a.txt"]);
        assert!(!inv.history("/a.txt").unwrap()[0].deleted);
        assert_eq!(inv.tag_for("v1", "/a.txt").unwrap().as_str(), "r1");
        assert!(inv.tag("v1", "/a.txt").unwrap().paths.is_none());
    }

    #[test]
    fn test_extend_normalizes_tag_paths() {
        let json = r#"{"tags": {"v1": [{"scope": "lib", "revision": "r1", "paths": ["lib/x.rs"]}]}}"#;
        let mut inv = RepositoryInventory::new();
        inv.extend(serde_json::from_str(json).unwrap());

        let tag = inv.tag("v1", "/lib/x.rs").unwrap();
        assert_eq!(tag.scope, "/lib");
        assert!(tag.contains("/lib/x.rs"));
    }

    #[test]
    fn test_extend_merges() {
        let mut a = RepositoryInventory::new();
        a.add_revision("/a.txt", "r1", "main", ts(1));
        let mut b = RepositoryInventory::new();
        b.add_revision("/a.txt", "r1", "dev", ts(1))
            .add_scoped_tag("/lib", "v2", "r9");

        a.extend(b);
        assert_eq!(a.history("/a.txt").unwrap()[0].branches.len(), 2);
        assert_eq!(a.tag_for("v2", "/lib/x").unwrap().as_str(), "r9");
    }

    #[test]
    fn test_extend_keeps_records_without_branches() {
        let json = r#"{"paths": {"a.txt": [{"id": "r1", "created": "2024-01-01T00:00:00Z"}]}}"#;
        let mut inv = RepositoryInventory::new();
        inv.extend(serde_json::from_str(json).unwrap());

        let history = inv.history("/a.txt").unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].branches.is_empty());
    }
}
