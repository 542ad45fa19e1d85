//! Configuration resolution for vmforge
//!
//! Merges partial configuration from several sources in a fixed precedence
//! order (command line > file > environment > built-in defaults) and
//! validates the result into one [`Specification`]. Merge-and-validate is
//! pure and all-or-nothing: either a complete valid specification comes
//! back, or an error naming every missing or invalid field.

pub mod error;
pub mod source;

pub use error::{ConfigError, Result};
pub use source::{BuiltinDefaults, CliOverrides, ConfigSource, EnvironmentDefaults, FileConfig};

use std::path::PathBuf;
use vmforge_core::{PartialSpecification, Specification};

/// Resolve configuration sources into a validated specification.
///
/// `sources` are ordered highest precedence first; a field set by an
/// earlier source is never overwritten by a later one.
pub fn resolve(sources: &[Box<dyn ConfigSource>]) -> Result<Specification> {
    let mut merged = PartialSpecification::default();

    for source in sources.iter().rev() {
        let partial = source.partial()?;
        tracing::debug!("Merging configuration from {}", source.name());
        merged.merge(partial);
    }

    Ok(merged.validate()?)
}

/// Locate a configuration file when none was given explicitly.
///
/// Search order:
/// 1. `vmforge.json` then `.vmforge.json` in the working directory
/// 2. `<user config dir>/vmforge/config.json`
pub fn find_config_file() -> Option<PathBuf> {
    let candidates = ["vmforge.json", ".vmforge.json"];

    if let Ok(current_dir) = std::env::current_dir() {
        for filename in &candidates {
            let path = current_dir.join(filename);
            if path.exists() {
                return Some(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("vmforge").join("config.json");
        if global.exists() {
            return Some(global);
        }
    }

    None
}
