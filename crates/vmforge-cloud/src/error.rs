//! Provider errors and retry classification

use std::time::Duration;
use thiserror::Error;

/// A failure reported by the cloud provider, carrying its classification
/// hint. Provider implementations map raw API errors into these variants;
/// [`ErrorClass::of`] decides what the orchestrator does with them.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("throttled by provider: {0}")]
    Throttled(String),

    #[error("conflicting operation in progress: {0}")]
    Conflict(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("invalid resource parameters: {0}")]
    InvalidParameters(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// What the orchestrator should do with a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; retry with backoff
    Retryable,

    /// The resource is already there; fold into success
    AlreadyExists,

    /// Fatal, non-retryable
    QuotaExceeded,

    /// Fatal, non-retryable
    InvalidConfiguration,
}

impl ErrorClass {
    /// Classify a provider failure.
    ///
    /// Transient network failures, throttling, provisioning-in-progress
    /// conflicts and timeouts retry; everything unrecognized is treated as
    /// non-retryable so a broken request is never hammered against the API.
    pub fn of(err: &ProviderError) -> ErrorClass {
        match err {
            ProviderError::Transient(_)
            | ProviderError::Throttled(_)
            | ProviderError::Conflict(_)
            | ProviderError::Timeout(_) => ErrorClass::Retryable,
            ProviderError::AlreadyExists(_) => ErrorClass::AlreadyExists,
            ProviderError::QuotaExceeded(_) => ErrorClass::QuotaExceeded,
            ProviderError::InvalidParameters(_) | ProviderError::Api(_) => {
                ErrorClass::InvalidConfiguration
            }
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Retryable => write!(f, "retryable"),
            ErrorClass::AlreadyExists => write!(f, "already exists"),
            ErrorClass::QuotaExceeded => write!(f, "quota exceeded"),
            ErrorClass::InvalidConfiguration => write!(f, "invalid configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_retry() {
        for err in [
            ProviderError::Transient("connection reset".into()),
            ProviderError::Throttled("429".into()),
            ProviderError::Conflict("provisioning in progress".into()),
            ProviderError::Timeout(Duration::from_secs(30)),
        ] {
            assert_eq!(ErrorClass::of(&err), ErrorClass::Retryable);
        }
    }

    #[test]
    fn fatal_failures_do_not_retry() {
        assert_eq!(
            ErrorClass::of(&ProviderError::QuotaExceeded("cores".into())),
            ErrorClass::QuotaExceeded
        );
        assert_eq!(
            ErrorClass::of(&ProviderError::InvalidParameters("bad sku".into())),
            ErrorClass::InvalidConfiguration
        );
        assert_eq!(
            ErrorClass::of(&ProviderError::Api("unknown".into())),
            ErrorClass::InvalidConfiguration
        );
    }

    #[test]
    fn already_exists_is_success() {
        assert_eq!(
            ErrorClass::of(&ProviderError::AlreadyExists("vnet-a".into())),
            ErrorClass::AlreadyExists
        );
    }
}
