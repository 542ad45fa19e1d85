//! Configuration sources
//!
//! Each source contributes one [`PartialSpecification`]; the resolver folds
//! them together by precedence. Sources are pure: none of them talks to the
//! network, and none of them reads the process environment — the binary
//! reads the environment and hands values in.

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::PathBuf;
use vmforge_core::{PartialSpecification, Secret};

/// A provider of partial configuration
pub trait ConfigSource {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    fn partial(&self) -> Result<PartialSpecification>;
}

/// Explicit command-line overrides. Highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub subscription_id: Option<String>,
    pub vm_name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub vm_size: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<Secret>,
}

impl ConfigSource for CliOverrides {
    fn name(&self) -> &'static str {
        "command line"
    }

    fn partial(&self) -> Result<PartialSpecification> {
        Ok(PartialSpecification {
            subscription_id: self.subscription_id.clone(),
            vm_name: self.vm_name.clone(),
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
            vm_size: self.vm_size.clone(),
            admin_username: self.admin_username.clone(),
            admin_password: self.admin_password.clone(),
            ..Default::default()
        })
    }
}

/// A JSON configuration file
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ConfigSource for FileConfig {
    fn name(&self) -> &'static str {
        "configuration file"
    }

    fn partial(&self) -> Result<PartialSpecification> {
        if !self.path.exists() {
            return Err(ConfigError::FileNotFound(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path).map_err(|e| ConfigError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let partial = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        tracing::debug!("Loaded configuration from {}", self.path.display());
        Ok(partial)
    }
}

/// Identity values the surrounding layer derived from the environment
/// (e.g. `AZURE_SUBSCRIPTION_ID`). The values are handed in already read.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentDefaults {
    pub subscription_id: Option<String>,
}

impl EnvironmentDefaults {
    pub fn new(subscription_id: Option<String>) -> Self {
        Self { subscription_id }
    }
}

impl ConfigSource for EnvironmentDefaults {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn partial(&self) -> Result<PartialSpecification> {
        Ok(PartialSpecification {
            subscription_id: self.subscription_id.clone(),
            ..Default::default()
        })
    }
}

/// Built-in defaults. Lowest precedence.
#[derive(Debug, Clone, Default)]
pub struct BuiltinDefaults;

impl ConfigSource for BuiltinDefaults {
    fn name(&self) -> &'static str {
        "built-in defaults"
    }

    fn partial(&self) -> Result<PartialSpecification> {
        Ok(PartialSpecification::builtin_defaults())
    }
}
