//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new()
//!     .with_spec(specs::DOCS_RELEASE)
//!     .with_inventory(inventories::DOCS);
//! fixture.command().arg("resolve").args(fixture.inventory_args()).assert().success();
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::inventories;
    pub use super::specs;
    #[allow(unused_imports)]
    pub use super::GitRepo;
    pub use super::TestFixture;
}

/// Config spec snippets.
#[allow(dead_code)]
pub mod specs {
    /// Release docs from a tag, internal docs out, everything else by default deny.
    pub const DOCS_RELEASE: &str = "# release docs\n/docs/** TAG release-1\n/docs/internal/** EXCLUDE\n";

    /// Everything from the tip of main.
    pub const ALL_MAIN: &str = "/** BRANCH main\n";

    /// Everything at its latest revision, internal docs excluded first.
    pub const LATEST_NO_INTERNAL: &str = "/docs/internal/** EXCLUDE\n/** LATEST\n";

    /// A branch that no revision is on.
    pub const MISSING_BRANCH: &str = "/** BRANCH does-not-exist\n";

    /// Unknown qualifier keyword on line 2.
    pub const BAD_KEYWORD: &str = "# header\n/src/** NEWEST\n";
}

/// Inventory JSON documents for `--inventory`.
#[allow(dead_code)]
pub mod inventories {
    /// Three paths on `main`, plus a `release-1` tag.
    pub const DOCS: &str = r#"{
  "paths": {
    "/docs/readme.md": [
      {"id": "d1", "branches": ["main"], "created": "2024-01-01T00:00:00Z"},
      {"id": "d2", "branches": ["main"], "created": "2024-03-01T00:00:00Z"}
    ],
    "/docs/internal/notes.md": [
      {"id": "n1", "branches": ["main"], "created": "2024-02-01T00:00:00Z"}
    ],
    "/other.txt": [
      {"id": "o1", "branches": ["main", "dev"], "created": "2024-01-15T00:00:00Z"}
    ]
  },
  "tags": {
    "release-1": [{"scope": "/", "revision": "rel1"}]
  }
}"#;
}

/// A temporary working directory with a config spec and optional inventory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `CONFIG_SPEC` with the given content.
    pub fn with_spec(self, content: &str) -> Self {
        self.with_file("CONFIG_SPEC", content)
    }

    /// Write `inventory.json` with the given content.
    #[allow(dead_code)]
    pub fn with_inventory(self, content: &str) -> Self {
        self.with_file("inventory.json", content)
    }

    /// Write `state.json` (a path to revision map) with the given content.
    #[allow(dead_code)]
    pub fn with_state(self, content: &str) -> Self {
        self.with_file("state.json", content)
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    pub fn spec_path(&self) -> PathBuf {
        self.temp_dir.path().join("CONFIG_SPEC")
    }

    /// Arguments selecting the fixture's inventory file.
    #[allow(dead_code)]
    pub fn inventory_args(&self) -> Vec<String> {
        vec![
            "--inventory".to_string(),
            self.path().join("inventory.json").display().to_string(),
        ]
    }

    /// A command running in the fixture directory, without colors.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("configspec");
        cmd.current_dir(self.path())
            .env_remove("CONFIGSPEC_FILE")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A scratch git repository with deterministic commit dates.
#[allow(dead_code)]
pub struct GitRepo {
    dir: PathBuf,
}

#[allow(dead_code)]
impl GitRepo {
    /// `git init` in `dir` with `main` as the initial branch.
    pub fn init(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).expect("Failed to create repository directory");
        let repo = Self {
            dir: dir.to_path_buf(),
        };
        repo.git(&["init", "--quiet", "--initial-branch=main"]);
        repo.git(&["config", "user.name", "Test"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    /// Write files and commit them at `date` (ISO 8601). Returns the commit id.
    pub fn commit(&self, files: &[(&str, &str)], date: &str) -> String {
        for (path, content) in files {
            let full = self.dir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("Failed to create parent directory");
            }
            std::fs::write(&full, content).expect("Failed to write file");
            self.git(&["add", path]);
        }
        let output = Command::new("git")
            .current_dir(&self.dir)
            .env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date)
            .args(["commit", "--quiet", "-m", "update"])
            .output()
            .expect("Failed to run git commit");
        assert!(output.status.success(), "git commit failed: {:?}", output);
        self.head()
    }

    pub fn tag(&self, name: &str) {
        self.git(&["tag", name]);
    }

    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .current_dir(&self.dir)
            .args(args)
            .output()
            .expect("Failed to run git");
        assert!(output.status.success(), "git {:?} failed: {:?}", args, output);
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_spec() {
        let fixture = TestFixture::new().with_spec(specs::ALL_MAIN);
        assert!(fixture.spec_path().exists());
    }

    #[test]
    fn test_inventory_is_valid_json() {
        serde_json::from_str::<serde_json::Value>(inventories::DOCS)
            .expect("Inventory should be valid JSON");
    }
}
