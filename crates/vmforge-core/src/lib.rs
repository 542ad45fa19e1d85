//! vmforge core model
//!
//! This crate holds everything that can be computed without touching the
//! cloud: the resolved [`Specification`], the partial-specification merge
//! used by the configuration layer, and the resource dependency graph that
//! drives provisioning.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  vmforge CLI                     │
//! │           (apply / plan / generate-config)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                vmforge-core                      │
//! │  ┌──────────────────┐  ┌─────────────────────┐  │
//! │  │  Specification   │  │  ProvisioningPlan   │  │
//! │  │  (merge+validate)│─▶│  (typed DAG, levels)│  │
//! │  └──────────────────┘  └─────────────────────┘  │
//! └───────┬─────────────────────────┬───────────────┘
//!         │                         │
//! ┌───────▼────────┐       ┌────────▼────────┐
//! │ vmforge-config │       │ vmforge-provision│
//! │   (sources)    │       │  (orchestrator)  │
//! └────────────────┘       └─────────────────┘
//! ```

pub mod error;
pub mod graph;
pub mod model;

// Re-exports
pub use error::{GraphError, ValidationError, Violation};
pub use graph::{
    CreateParams, NsgRule, ProvisioningPlan, ResourceDescriptor, ResourceKind, ResourceState,
};
pub use model::{
    Cidr, ImageReference, NetworkSpec, OsDiskSpec, PartialSpecification, Secret, SecuritySpec,
    Specification,
};
