//! # Errors
//!
//! Fatal errors that abort a translation run. Per-line translation problems
//! are not errors in this sense; they are collected as [`crate::diag::Diagnostic`]s
//! and logged without stopping sibling translations.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GoslError>;

#[derive(Debug, thiserror::Error)]
pub enum GoslError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gosl requires module mode: no go.mod found in {0} or any parent directory")]
    NoModule(PathBuf),

    #[error("failed to load package {path}: {reason}")]
    PackageLoad { path: String, reason: String },

    #[error("no Go package found in {0}")]
    NoPackage(PathBuf),

    #[error("more than one package found in {dir}: {names:?}")]
    MultiplePackages { dir: PathBuf, names: Vec<String> },

    #[error("{file}:{line}: syntax error: {message}")]
    Parse {
        file: String,
        line: u32,
        message: String,
    },

    #[error("system {system:?}: group {group:?} is declared by more than one vars block")]
    GroupConflict { system: String, group: String },

    #[error("kernel {0:?} not found in function call graph")]
    KernelNotFound(String),

    #[error("failed to write manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl GoslError {
    /// Wraps an [`std::io::Error`] with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GoslError::Io {
            path: path.into(),
            source,
        }
    }
}
