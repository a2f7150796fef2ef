//! # Error Handling
//!
//! This module defines the crate-level error type for `git-configspec`. Each
//! pipeline stage has its own focused error; this `Error` enum wraps the
//! parsing, store and lock errors together with the I/O, serialization and
//! git-command failures that the outer layers can run into.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum covering every failure the library reports.
//!   Stage errors convert into it with `?` via `#[from]`.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Per-path resolution failures are never flattened into `Error`: the
//! orchestrator reports them as a list with their own result code.

use std::path::PathBuf;

use thiserror::Error;

use crate::lock::LockError;
use crate::spec::ParseError;
use crate::store::StoreError;

/// Main error type for configspec operations
#[derive(Error, Debug)]
pub enum Error {
    /// The config spec text could not be parsed.
    #[error("Config spec parsing error: {0}")]
    Parse(#[from] ParseError),

    /// A batch could not be fully applied to the working tree.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The working tree lock could not be taken.
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// A settings file could not be interpreted.
    ///
    /// Includes an optional hint about how to fix the problem.
    #[error("Settings error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Settings {
        message: String,
        /// Optional hint for how to fix the settings issue
        hint: Option<String>,
    },

    /// An error occurred while executing a git command.
    #[error("Git command failed in {}: {command} - {stderr}", dir.display())]
    GitCommand {
        command: String,
        dir: PathBuf,
        stderr: String,
    },

    /// A configured repository root does not exist on disk.
    #[error("Non-existing repository root: {}", path.display())]
    MissingRepository { path: PathBuf },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A TOML parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
