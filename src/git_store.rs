//! Git-backed version store
//!
//! Drives the system `git` binary, so whatever authentication and
//! configuration the user has for git applies unchanged.
//!
//! A working tree holds one or more repositories. Each is configured by its
//! root relative to the tree (`"."` is the tree itself). A logical path
//! belongs to the repository whose root is its longest prefix, and fetching
//! `/libs/core/src/a.rs` at `r` becomes:
//!
//! ```text
//! git -C <tree>/libs/core checkout r -- src/a.rs
//! ```
//!
//! What has been materialized is recorded in `<state_dir>/state.json`; the
//! same directory holds the tree lock. A tree without a manifest is taken to
//! hold what each repository's `HEAD` checked out: every tracked file present
//! on disk, at the last commit that changed it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::StoreSettings;
use crate::error::{Error, Result};
use crate::inventory::{RepositoryInventory, RevisionId};
use crate::lock::{LockError, TreeLock};
use crate::path::{self, is_within};
use crate::planner::{CurrentState, Operation, OperationBatch};
use crate::store::{StoreError, VersionStore};

/// Name of the state manifest inside the state directory.
pub const STATE_FILE: &str = "state.json";

/// One repository inside the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRoot {
    /// Logical path of the root, `/` for the tree itself.
    pub logical: String,
    /// Directory on disk.
    pub dir: PathBuf,
}

impl RepositoryRoot {
    /// Path of `logical_path` relative to this root, as git expects it.
    fn relative<'a>(&self, logical_path: &'a str) -> &'a str {
        if self.logical == "/" {
            logical_path.trim_start_matches('/')
        } else {
            logical_path[self.logical.len()..].trim_start_matches('/')
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateManifest {
    #[serde(default)]
    paths: CurrentState,
}

/// One file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileChange {
    path: String,
    deleted: bool,
}

/// A commit as reported by `git log`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogEntry {
    id: String,
    created: DateTime<Utc>,
    files: Vec<FileChange>,
}

/// Store that materializes revisions with `git checkout`.
#[derive(Debug)]
pub struct GitStore {
    tree: PathBuf,
    state_dir: PathBuf,
    roots: Vec<RepositoryRoot>,
}

impl GitStore {
    /// Open the store for `tree`.
    ///
    /// Repository roots that do not exist fail with
    /// [`Error::MissingRepository`] unless `ignore_nonexisting` is set, in
    /// which case they are skipped with a warning.
    pub fn open(tree: &Path, settings: &StoreSettings, ignore_nonexisting: bool) -> Result<Self> {
        let mut roots = Vec::new();
        for repo in &settings.repositories {
            let dir = tree.join(repo);
            if !dir.is_dir() {
                if ignore_nonexisting {
                    warn!("Skipping non-existing repository root {}", dir.display());
                    continue;
                }
                return Err(Error::MissingRepository { path: dir });
            }
            roots.push(RepositoryRoot {
                logical: path::normalize(repo),
                dir,
            });
        }

        // Longest root first, so the first containing root is the owner.
        roots.sort_by(|a, b| {
            path::depth(&b.logical)
                .cmp(&path::depth(&a.logical))
                .then_with(|| a.logical.cmp(&b.logical))
        });
        roots.dedup_by(|a, b| a.logical == b.logical);

        debug!(
            "Git store on {} with {} repositor{}",
            tree.display(),
            roots.len(),
            if roots.len() == 1 { "y" } else { "ies" }
        );

        Ok(Self {
            tree: tree.to_path_buf(),
            state_dir: tree.join(&settings.state_dir),
            roots,
        })
    }

    pub fn roots(&self) -> &[RepositoryRoot] {
        &self.roots
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// The repository owning `logical_path`.
    pub fn root_for(&self, logical_path: &str) -> Option<&RepositoryRoot> {
        self.roots
            .iter()
            .find(|root| is_within(logical_path, &root.logical))
    }

    fn file_for(&self, logical_path: &str) -> PathBuf {
        self.tree.join(logical_path.trim_start_matches('/'))
    }

    /// Whether `root` owns `logical_path`, rather than a repository nested in it.
    fn owns(&self, root: &RepositoryRoot, logical_path: &str) -> bool {
        self.root_for(logical_path)
            .is_some_and(|owner| owner.logical == root.logical)
    }

    fn repository_inventory(&self, root: &RepositoryRoot) -> Result<RepositoryInventory> {
        let mut inventory = RepositoryInventory::new();

        let branches = run_git(
            &root.dir,
            &["for-each-ref", "refs/heads", "--format=%(refname:short)"],
        )?;
        for branch in branches.lines().map(str::trim).filter(|b| !b.is_empty()) {
            for entry in parse_log(&git_log(&root.dir, branch)?) {
                for file in &entry.files {
                    let logical = path::join(&root.logical, &file.path);
                    if !self.owns(root, &logical) {
                        continue;
                    }
                    if file.deleted {
                        inventory.add_deletion(&logical, entry.id.as_str(), branch, entry.created);
                    } else {
                        inventory.add_revision(&logical, entry.id.as_str(), branch, entry.created);
                    }
                }
            }
        }

        let tags = run_git(
            &root.dir,
            &[
                "for-each-ref",
                "refs/tags",
                "--format=%(refname:short) %(objectname) %(*objectname)",
            ],
        )?;
        for (name, revision) in parse_tags(&tags) {
            let tree = run_git(
                &root.dir,
                &[
                    "-c",
                    "core.quotePath=false",
                    "ls-tree",
                    "-r",
                    "--name-only",
                    revision.as_str(),
                ],
            )?;
            let contents: Vec<String> = tree
                .lines()
                .filter(|line| !line.is_empty())
                .map(|file| path::join(&root.logical, file))
                .filter(|logical| self.owns(root, logical))
                .collect();
            inventory.add_tag_with_paths(&root.logical, &name, revision, contents);
        }

        debug!(
            "Repository {} contributes {} path(s)",
            root.logical,
            inventory.len()
        );
        Ok(inventory)
    }

    fn load_state(&self) -> Result<CurrentState> {
        let path = self.state_dir.join(STATE_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let manifest: StateManifest = serde_json::from_str(&content)?;
                Ok(manifest.paths)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let mut state = CurrentState::new();
                for root in &self.roots {
                    state.extend(self.checked_out_state(root)?);
                }
                info!(
                    "No state manifest yet, {} checked-out path(s) found",
                    state.len()
                );
                Ok(state)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Tracked files of `root` present on disk, each at the last commit on
    /// `HEAD` that changed it.
    fn checked_out_state(&self, root: &RepositoryRoot) -> Result<CurrentState> {
        let mut state = CurrentState::new();
        if run_git(&root.dir, &["rev-parse", "--verify", "--quiet", "HEAD"]).is_err() {
            debug!("{} has no commits checked out", root.dir.display());
            return Ok(state);
        }

        let listed = run_git(&root.dir, &["-c", "core.quotePath=false", "ls-files"])?;
        let tracked: BTreeSet<&str> = listed.lines().filter(|line| !line.is_empty()).collect();

        for entry in parse_log(&git_log(&root.dir, "HEAD")?) {
            for file in &entry.files {
                if file.deleted || !tracked.contains(file.path.as_str()) {
                    continue;
                }
                let logical = path::join(&root.logical, &file.path);
                if state.contains_key(&logical) || !self.owns(root, &logical) {
                    continue;
                }
                if self.file_for(&logical).is_file() {
                    state.insert(logical, RevisionId::new(entry.id.as_str()));
                }
            }
        }
        Ok(state)
    }

    /// Replace the manifest atomically, so a crash never leaves half of it.
    fn save_state(&self, state: CurrentState) -> Result<()> {
        fs::create_dir_all(&self.state_dir)?;
        let manifest = StateManifest { paths: state };
        let mut file = NamedTempFile::new_in(&self.state_dir)?;
        serde_json::to_writer_pretty(&mut file, &manifest)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(self.state_dir.join(STATE_FILE)).map_err(|e| e.error)?;
        Ok(())
    }

    fn execute(&self, op: &Operation) -> Result<()> {
        match op {
            Operation::Fetch { path, revision } => {
                let root = self.root_for(path).ok_or_else(|| Error::MissingRepository {
                    path: self.file_for(path),
                })?;
                run_git(
                    &root.dir,
                    &["checkout", revision.as_str(), "--", root.relative(path)],
                )?;
            }
            Operation::Remove { path } => match fs::remove_file(self.file_for(path)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("{} already absent", path);
                }
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

impl VersionStore for GitStore {
    fn inventory(&self) -> Result<RepositoryInventory> {
        let parts: Vec<RepositoryInventory> = self
            .roots
            .par_iter()
            .map(|root| self.repository_inventory(root))
            .collect::<Result<Vec<_>>>()?;

        let mut inventory = RepositoryInventory::new();
        for part in parts {
            inventory.extend(part);
        }
        Ok(inventory)
    }

    fn current_state(&self) -> Result<CurrentState> {
        self.load_state()
    }

    fn lock(&self) -> std::result::Result<TreeLock, LockError> {
        TreeLock::acquire(&self.state_dir)
    }

    fn apply(&mut self, batch: OperationBatch) -> std::result::Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = match self.load_state() {
            Ok(state) => state,
            Err(e) => {
                let mut ops = batch.into_iter();
                return match ops.next() {
                    Some(failed) => Err(StoreError {
                        applied: Vec::new(),
                        failed,
                        remaining: ops.collect(),
                        message: format!("cannot read state manifest: {}", e),
                    }),
                    None => Ok(()),
                };
            }
        };

        let mut applied: Vec<Operation> = Vec::new();
        let mut pending = batch.into_iter();

        while let Some(op) = pending.next() {
            info!("{}", self.describe(&op));
            if let Err(e) = self.execute(&op) {
                if let Err(save) = self.save_state(state) {
                    warn!("Could not record partial state: {}", save);
                }
                return Err(StoreError {
                    applied,
                    failed: op,
                    remaining: pending.collect(),
                    message: e.to_string(),
                });
            }

            match &op {
                Operation::Fetch { path, revision } => {
                    state.insert(path.clone(), revision.clone());
                }
                Operation::Remove { path } => {
                    state.remove(path);
                }
            }
            applied.push(op);
        }

        match self.save_state(state) {
            Ok(()) => Ok(()),
            // Every operation ran but the last one is not on record, so the
            // next plan redoes it.
            Err(e) => match applied.pop() {
                Some(failed) => Err(StoreError {
                    applied,
                    failed,
                    remaining: Vec::new(),
                    message: format!("cannot write state manifest: {}", e),
                }),
                None => Ok(()),
            },
        }
    }

    fn describe(&self, op: &Operation) -> String {
        match op {
            Operation::Fetch { path, revision } => match self.root_for(path) {
                Some(root) => format!(
                    "git -C {} checkout {} -- {}",
                    root.dir.display(),
                    revision,
                    root.relative(path)
                ),
                None => op.to_string(),
            },
            Operation::Remove { path } => format!("rm {}", self.file_for(path).display()),
        }
    }
}

/// Run `git -C dir args...` and return its standard output.
fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            dir: dir.to_path_buf(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            dir: dir.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// History of `rev` with the status of every file each commit touched.
///
/// Renames are split into a deletion and an addition.
fn git_log(dir: &Path, rev: &str) -> Result<String> {
    run_git(
        dir,
        &[
            "-c",
            "core.quotePath=false",
            "log",
            rev,
            "--format=%x00%H %ct",
            "--name-status",
            "--no-renames",
            "--",
        ],
    )
}

/// Parse `git log --format=%x00%H %ct --name-status` output.
fn parse_log(output: &str) -> Vec<LogEntry> {
    let mut entries: Vec<LogEntry> = Vec::new();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix('\0') {
            let mut parts = header.split_whitespace();
            let id = parts.next().unwrap_or_default();
            let created = parts
                .next()
                .and_then(|secs| secs.parse::<i64>().ok())
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
            match created {
                Some(created) if !id.is_empty() => entries.push(LogEntry {
                    id: id.to_string(),
                    created,
                    files: Vec::new(),
                }),
                _ => warn!("Ignoring malformed git log header: {:?}", header),
            }
        } else if let Some((status, file)) = line.split_once('\t') {
            if let Some(entry) = entries.last_mut() {
                entry.files.push(FileChange {
                    path: file.to_string(),
                    deleted: status.starts_with('D'),
                });
            }
        } else if !line.trim().is_empty() {
            warn!("Ignoring unexpected git log line: {:?}", line);
        }
    }

    entries
}

/// Parse `git for-each-ref refs/tags` output into tag name and commit id.
///
/// Annotated tags report the tag object and the peeled commit; the commit wins.
fn parse_tags(output: &str) -> BTreeMap<String, RevisionId> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let object = parts.next()?;
            let commit = parts.next().unwrap_or(object);
            Some((name.to_string(), RevisionId::new(commit)))
        })
        .collect()
}
