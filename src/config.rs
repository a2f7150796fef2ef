//! # Settings
//!
//! Optional `.configspec.toml` at the root of a working tree. Every field has
//! a default, so a missing file and an empty file behave the same.
//!
//! ```toml
//! [resolution]
//! stop_on_first_error = false
//! case_sensitive_paths = true
//!
//! [store]
//! state_dir = ".configspec"
//! repositories = [".", "libs/core"]
//! ```
//!
//! Command-line flags override values read from the file.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default settings file name, looked up at the working tree root.
pub const SETTINGS_FILE: &str = ".configspec.toml";

/// Options recognized by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionOptions {
    /// Return the first per-path failure instead of collecting all of them.
    pub stop_on_first_error: bool,
    /// Match rule patterns case-sensitively.
    pub case_sensitive_paths: bool,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            stop_on_first_error: false,
            case_sensitive_paths: true,
        }
    }
}

/// Where the git store keeps its state and which repositories it manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Directory (relative to the tree) holding the lock and state manifest.
    pub state_dir: PathBuf,
    /// Repository roots, relative to the tree.
    pub repositories: Vec<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".configspec"),
            repositories: vec![".".to_string()],
        }
    }
}

/// Contents of a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub resolution: ResolutionOptions,
    pub store: StoreSettings,
}

/// Parse settings from TOML text.
pub fn parse(toml_content: &str) -> Result<Settings> {
    toml::from_str(toml_content).map_err(|e| Error::Settings {
        message: e.message().to_string(),
        hint: Some(
            "recognized tables are [resolution] (stop_on_first_error, case_sensitive_paths) \
             and [store] (state_dir, repositories)"
                .to_string(),
        ),
    })
}

/// Read settings from a file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse(&content)
}

/// Load `.configspec.toml` from `tree`, or defaults when it does not exist.
pub fn load_or_default(tree: &Path) -> Result<Settings> {
    let path = tree.join(SETTINGS_FILE);
    if path.exists() {
        debug!("Loading settings from {}", path.display());
        from_file(&path)
    } else {
        debug!("No {} in {}, using defaults", SETTINGS_FILE, tree.display());
        Ok(Settings::default())
    }
}
