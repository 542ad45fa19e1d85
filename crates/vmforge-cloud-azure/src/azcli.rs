//! az CLI wrapper
//!
//! Thin process wrapper around the `az` command. Every call pins the
//! subscription and requests JSON output; stderr of failed commands is
//! returned verbatim for classification.

use crate::error::{AzureError, Result};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;

/// az CLI wrapper, bound to one subscription
pub struct AzCli {
    subscription: String,
}

/// `az account show` payload (the fields we care about)
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    pub user: Option<AccountUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountUser {
    pub name: Option<String>,
}

impl AzCli {
    pub fn new(subscription: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
        }
    }

    /// Check that az is installed and a session exists
    pub async fn check_auth(&self) -> Result<AccountInfo> {
        let which = Command::new("which").arg("az").output().await?;
        if !which.status.success() {
            return Err(AzureError::AzNotFound);
        }

        let output = self.run(&["account".to_string(), "show".to_string()]).await?;
        let account: AccountInfo = serde_json::from_str(&output)?;
        Ok(account)
    }

    /// Run an az command and return stdout
    pub async fn run(&self, args: &[String]) -> Result<String> {
        let mut cmd = Command::new("az");
        cmd.args(args);
        cmd.arg("--subscription").arg(&self.subscription);
        cmd.arg("--output").arg("json");
        cmd.arg("--only-show-errors");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: az {}", args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AzureError::CommandFailed {
                stderr: stderr.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
