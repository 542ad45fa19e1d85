//! Run results and the final report

use chrono::{DateTime, Utc};
use serde::Serialize;
use vmforge_core::{ResourceDescriptor, ResourceKind, ResourceState};

/// Why a resource ended up in [`ResourceState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retry budget exhausted on a transient failure
    Exhausted,
    QuotaExceeded,
    InvalidConfiguration,
    /// A resource this one depends on did not reach a usable state
    DependencyFailed,
    /// Orchestrator-internal defect (e.g. a panicked worker task)
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Exhausted => write!(f, "retries exhausted"),
            FailureKind::QuotaExceeded => write!(f, "quota exceeded"),
            FailureKind::InvalidConfiguration => write!(f, "invalid configuration"),
            FailureKind::DependencyFailed => write!(f, "dependency failed"),
            FailureKind::Internal => write!(f, "internal error"),
        }
    }
}

/// Classification and provider message for a failed resource
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Terminal record for one resource, appended exactly once per descriptor
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRun {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub state: ResourceState,
    pub failure: Option<Failure>,

    /// Number of provisioning attempts made (0 if never started)
    pub attempts: u32,

    /// Dry run only: the creation parameters that would have been sent
    pub would_create: Option<serde_json::Value>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ResourceRun {
    /// Record for a resource that never ran (cancelled before start, or a
    /// dependency failed)
    pub(crate) fn unstarted(
        descriptor: &ResourceDescriptor,
        state: ResourceState,
        failure: Option<Failure>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: descriptor.id.clone(),
            kind: descriptor.kind,
            name: descriptor.name.clone(),
            state,
            failure,
            attempts: 0,
            would_create: None,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }
}

/// Per-state counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub created: usize,
    pub already_exists: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} already existed, {} skipped, {} failed, {} cancelled",
            self.created, self.already_exists, self.skipped, self.failed, self.cancelled
        )
    }
}

/// Everything that happened during one `execute` invocation.
///
/// Results appear in plan order regardless of completion order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub results: Vec<ResourceRun>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !self
            .results
            .iter()
            .any(|r| r.state == ResourceState::Failed)
    }

    pub fn result(&self, id: &str) -> Option<&ResourceRun> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for r in &self.results {
            match r.state {
                ResourceState::Created => summary.created += 1,
                ResourceState::AlreadyExists => summary.already_exists += 1,
                ResourceState::Skipped => summary.skipped += 1,
                ResourceState::Failed => summary.failed += 1,
                ResourceState::Cancelled => summary.cancelled += 1,
                ResourceState::Pending | ResourceState::Creating => {}
            }
        }
        summary
    }
}
