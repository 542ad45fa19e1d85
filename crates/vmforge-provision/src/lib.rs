//! Provisioning orchestrator
//!
//! Walks a [`vmforge_core::ProvisioningPlan`] level by level: resources
//! within a level are created concurrently, levels are separated by barrier
//! synchronization, and every resource goes through the existence check /
//! create / retry pipeline against the [`vmforge_cloud::CloudClient`].
//!
//! The orchestrator never rolls back. A fatal failure poisons only the
//! descendants of the failed resource; sibling branches run to completion
//! and the final [`RunReport`] shows exactly what happened to each
//! resource.

pub mod executor;
pub mod run;

pub use executor::{Mode, Orchestrator};
pub use run::{Failure, FailureKind, ResourceRun, RunReport, RunSummary};
