//! Level-by-level plan execution

use crate::run::{Failure, FailureKind, ResourceRun, RunReport};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use vmforge_cloud::{CloudClient, ErrorClass, ProviderError, ResourceHandle, RetryPolicy};
use vmforge_core::{ProvisioningPlan, ResourceDescriptor, ResourceState};

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create missing resources
    Apply,
    /// Validate and preview only; no mutating remote call is issued
    DryRun,
}

/// Walks a provisioning plan against a cloud client.
///
/// The client handle is an explicit constructor dependency; the
/// orchestrator owns no global state and one instance serves exactly one
/// invocation's worth of runs at a time.
pub struct Orchestrator {
    client: Arc<dyn CloudClient>,
    retry: RetryPolicy,
    create_timeout: Duration,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            create_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    /// Execute the plan level by level.
    ///
    /// Within a level all resources run concurrently; the next level starts
    /// only after every resource of the current level reached a terminal
    /// state. On cancellation, in-flight creations are allowed to finish,
    /// nothing new is started, and unstarted resources are reported as
    /// [`ResourceState::Cancelled`].
    pub async fn execute(
        &self,
        plan: &ProvisioningPlan,
        mode: Mode,
        cancel: CancellationToken,
    ) -> RunReport {
        let run_started = Instant::now();

        let mut states: HashMap<String, ResourceState> = plan
            .descriptors()
            .iter()
            .map(|d| (d.id.clone(), ResourceState::Pending))
            .collect();
        let mut handles: HashMap<String, ResourceHandle> = HashMap::new();
        let mut runs: HashMap<String, ResourceRun> = HashMap::new();

        for level in plan.levels() {
            if cancel.is_cancelled() {
                break;
            }

            let mut tasks: JoinSet<(ResourceRun, Option<ResourceHandle>)> = JoinSet::new();

            for id in level {
                let Some(descriptor) = plan.descriptor(id) else {
                    continue;
                };

                // Dependency gate: anything short of a satisfied dependency
                // poisons this resource without touching the cloud.
                let blocked = descriptor
                    .depends_on
                    .iter()
                    .find(|dep| !states.get(dep.as_str()).is_some_and(|s| s.is_satisfied()));
                if let Some(dep) = blocked {
                    let run = match states.get(dep.as_str()) {
                        Some(ResourceState::Cancelled) => ResourceRun::unstarted(
                            descriptor,
                            ResourceState::Cancelled,
                            None,
                        ),
                        _ => ResourceRun::unstarted(
                            descriptor,
                            ResourceState::Failed,
                            Some(Failure::new(
                                FailureKind::DependencyFailed,
                                format!("dependency failed: {}", dep),
                            )),
                        ),
                    };
                    tracing::warn!(resource = %descriptor.id, state = %run.state, "not provisioning");
                    states.insert(descriptor.id.clone(), run.state);
                    runs.insert(descriptor.id.clone(), run);
                    continue;
                }

                // A cancellation mid-level stops new resources, not the
                // ones already in flight.
                if cancel.is_cancelled() {
                    let run =
                        ResourceRun::unstarted(descriptor, ResourceState::Cancelled, None);
                    states.insert(descriptor.id.clone(), run.state);
                    runs.insert(descriptor.id.clone(), run);
                    continue;
                }

                states.insert(descriptor.id.clone(), ResourceState::Creating);

                let worker = Worker {
                    client: Arc::clone(&self.client),
                    retry: self.retry.clone(),
                    create_timeout: self.create_timeout,
                    mode,
                    cancel: cancel.clone(),
                };
                let descriptor = descriptor.clone();
                let deps: HashMap<String, ResourceHandle> = descriptor
                    .depends_on
                    .iter()
                    .filter_map(|dep| handles.get(dep).map(|h| (dep.clone(), h.clone())))
                    .collect();

                tasks.spawn(async move { worker.provision(descriptor, deps).await });
            }

            // Barrier: the level is done when every task is.
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((run, handle)) => {
                        if let Some(handle) = handle {
                            handles.insert(run.id.clone(), handle);
                        }
                        states.insert(run.id.clone(), run.state);
                        runs.insert(run.id.clone(), run);
                    }
                    Err(e) => {
                        tracing::error!("provisioning task failed to join: {e}");
                    }
                }
            }

            // A panicked worker leaves its resource in Creating with no run
            // record; surface that as an internal failure.
            for id in level {
                if states.get(id.as_str()) == Some(&ResourceState::Creating) {
                    if let Some(descriptor) = plan.descriptor(id) {
                        let run = ResourceRun::unstarted(
                            descriptor,
                            ResourceState::Failed,
                            Some(Failure::new(FailureKind::Internal, "worker task panicked")),
                        );
                        states.insert(id.clone(), run.state);
                        runs.insert(id.clone(), run);
                    }
                }
            }
        }

        // Resources never reached because of cancellation.
        for descriptor in plan.descriptors() {
            if states.get(descriptor.id.as_str()) == Some(&ResourceState::Pending) {
                runs.insert(
                    descriptor.id.clone(),
                    ResourceRun::unstarted(descriptor, ResourceState::Cancelled, None),
                );
            }
        }

        let results = plan
            .descriptors()
            .iter()
            .filter_map(|d| runs.remove(&d.id))
            .collect();

        RunReport {
            results,
            duration_ms: run_started.elapsed().as_millis() as u64,
        }
    }
}

enum Outcome {
    Created(ResourceHandle),
    Exists,
    DryRun,
    Fatal(FailureKind, String),
    Cancelled,
}

/// Per-resource provisioning pipeline, cloned into each level task
struct Worker {
    client: Arc<dyn CloudClient>,
    retry: RetryPolicy,
    create_timeout: Duration,
    mode: Mode,
    cancel: CancellationToken,
}

impl Worker {
    async fn provision(
        &self,
        descriptor: ResourceDescriptor,
        deps: HashMap<String, ResourceHandle>,
    ) -> (ResourceRun, Option<ResourceHandle>) {
        let started_at = Utc::now();
        let t0 = Instant::now();
        let mut attempts = 0u32;

        let outcome = loop {
            attempts += 1;
            match self.attempt(&descriptor, &deps).await {
                Ok(outcome) => break outcome,
                Err(err) => match ErrorClass::of(&err) {
                    // A concurrent creator beat us between check and create.
                    ErrorClass::AlreadyExists => break Outcome::Exists,
                    ErrorClass::QuotaExceeded => {
                        break Outcome::Fatal(FailureKind::QuotaExceeded, err.to_string());
                    }
                    ErrorClass::InvalidConfiguration => {
                        break Outcome::Fatal(
                            FailureKind::InvalidConfiguration,
                            err.to_string(),
                        );
                    }
                    ErrorClass::Retryable => {
                        if attempts >= self.retry.max_attempts {
                            break Outcome::Fatal(
                                FailureKind::Exhausted,
                                format!("giving up after {} attempts: {}", attempts, err),
                            );
                        }
                        let delay = self.retry.delay_for_attempt(attempts - 1);
                        tracing::warn!(
                            resource = %descriptor.id,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "transient failure, retrying: {err}"
                        );
                        tokio::select! {
                            _ = self.cancel.cancelled() => break Outcome::Cancelled,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                },
            }
        };

        let (state, failure, would_create, handle) = match outcome {
            Outcome::Created(handle) => {
                tracing::info!(resource = %descriptor.id, "created");
                (ResourceState::Created, None, None, Some(handle))
            }
            Outcome::Exists => {
                tracing::info!(resource = %descriptor.id, "already exists, leaving untouched");
                (
                    ResourceState::AlreadyExists,
                    None,
                    None,
                    Some(ResourceHandle::new(descriptor.name.clone())),
                )
            }
            Outcome::DryRun => (
                ResourceState::Skipped,
                None,
                Some(descriptor.params.preview()),
                Some(ResourceHandle::new(descriptor.name.clone())),
            ),
            Outcome::Fatal(kind, message) => {
                tracing::error!(resource = %descriptor.id, %kind, "provisioning failed: {message}");
                (
                    ResourceState::Failed,
                    Some(Failure::new(kind, message)),
                    None,
                    None,
                )
            }
            Outcome::Cancelled => (ResourceState::Cancelled, None, None, None),
        };

        let finished_at = Utc::now();
        let run = ResourceRun {
            id: descriptor.id.clone(),
            kind: descriptor.kind,
            name: descriptor.name,
            state,
            failure,
            attempts,
            would_create,
            started_at,
            finished_at,
            duration_ms: t0.elapsed().as_millis() as u64,
        };
        (run, handle)
    }

    /// One provisioning attempt: existence check, then (in Apply mode) the
    /// creation call under the per-resource timeout.
    async fn attempt(
        &self,
        descriptor: &ResourceDescriptor,
        deps: &HashMap<String, ResourceHandle>,
    ) -> Result<Outcome, ProviderError> {
        if self.client.exists(descriptor.kind, &descriptor.name).await? {
            return Ok(Outcome::Exists);
        }

        if self.mode == Mode::DryRun {
            return Ok(Outcome::DryRun);
        }

        match tokio::time::timeout(self.create_timeout, self.client.create(descriptor, deps))
            .await
        {
            Ok(result) => Ok(Outcome::Created(result?)),
            Err(_) => Err(ProviderError::Timeout(self.create_timeout)),
        }
    }
}
