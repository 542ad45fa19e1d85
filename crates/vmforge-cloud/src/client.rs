//! Cloud client trait

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use vmforge_core::{ResourceDescriptor, ResourceKind};

/// Handle to a resource on the provider side
#[derive(Debug, Clone, Default)]
pub struct ResourceHandle {
    /// Provider-side identifier (falls back to the resource name when the
    /// provider does not return one)
    pub id: String,

    /// Provider-reported attributes (IP address, provisioning state, ...)
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// The only component that talks to the remote cloud API.
///
/// Implementations must be safe to call concurrently; the orchestrator
/// shares one client across all resources of a level.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Whether a resource of this kind and name already exists
    async fn exists(&self, kind: ResourceKind, name: &str) -> Result<bool>;

    /// Create the resource described by `descriptor`.
    ///
    /// `deps` maps the descriptor ids of already-satisfied dependencies to
    /// their provider handles. Creation must be idempotent at the provider
    /// level where possible; a concurrent creation by another process
    /// surfaces as [`crate::ProviderError::AlreadyExists`], which callers
    /// treat as success.
    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        deps: &HashMap<String, ResourceHandle>,
    ) -> Result<ResourceHandle>;
}
