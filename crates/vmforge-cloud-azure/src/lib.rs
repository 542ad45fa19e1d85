//! Azure provider
//!
//! Implements [`vmforge_cloud::CloudClient`] on top of the `az` CLI:
//! resource existence via `show`/`exists` subcommands, creation via the
//! corresponding `create` subcommands, stderr mapped to the failure
//! classification consumed by the orchestrator. Authentication is the
//! CLI's problem (`az login`); vmforge assumes a signed-in session.

pub mod azcli;
pub mod client;
pub mod error;

pub use azcli::AzCli;
pub use client::AzureClient;
pub use error::{AzureError, Result};
