// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivebuildError {
    /// A watch could not be installed on a path. Not fatal: the owner simply
    /// stops watching that target.
    #[error("cannot watch path {path:?}: {reason}")]
    PathUnavailable { path: PathBuf, reason: String },

    #[error("build script is empty; set `script` in the [build] section of the config")]
    EmptyScript,

    #[error("failed to spawn build process: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LivebuildError {
    pub fn path_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LivebuildError::PathUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LivebuildError>;
