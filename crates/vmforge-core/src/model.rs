//! Specification model
//!
//! The [`Specification`] is the fully resolved, validated description of the
//! VM and its network to provision. It is built by merging
//! [`PartialSpecification`]s from several configuration sources and is
//! immutable afterwards.

mod cidr;
mod partial;
mod secret;
mod spec;

pub use cidr::{Cidr, ParseCidrError};
pub use partial::PartialSpecification;
pub use secret::Secret;
pub use spec::{ImageReference, NetworkSpec, OsDiskSpec, SecuritySpec, Specification};
