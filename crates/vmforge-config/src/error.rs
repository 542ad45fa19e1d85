//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;
use vmforge_core::ValidationError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
