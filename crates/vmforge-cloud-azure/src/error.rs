//! Azure provider errors and stderr classification

use thiserror::Error;
use vmforge_cloud::ProviderError;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("az CLI not found; install the Azure CLI and run `az login`")]
    AzNotFound,

    #[error("az command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("unexpected az output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to run az: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AzureError>;

impl From<AzureError> for ProviderError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::CommandFailed { stderr } => classify_stderr(stderr),
            // spawn failures are host-local and worth another try
            AzureError::Io(e) => ProviderError::Transient(e.to_string()),
            AzureError::Json(e) => ProviderError::Api(e.to_string()),
            AzureError::AzNotFound => ProviderError::Api(err.to_string()),
        }
    }
}

/// Map az stderr text onto the classification the orchestrator consumes.
///
/// Azure error codes arrive embedded in free-form stderr, so this matches
/// on the code substrings. Anything unrecognized is non-retryable.
pub(crate) fn classify_stderr(stderr: String) -> ProviderError {
    let lower = stderr.to_lowercase();

    if lower.contains("already exists") || lower.contains("alreadyexists") {
        ProviderError::AlreadyExists(stderr)
    } else if lower.contains("quotaexceeded") || lower.contains("quota limit") {
        ProviderError::QuotaExceeded(stderr)
    } else if lower.contains("toomanyrequests")
        || lower.contains("429")
        || lower.contains("throttl")
    {
        ProviderError::Throttled(stderr)
    } else if lower.contains("anotheroperationinprogress")
        || lower.contains("conflictingoperation")
        || lower.contains("retryableerror")
    {
        ProviderError::Conflict(stderr)
    } else if lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("serviceunavailable")
        || lower.contains("internalservererror")
        || lower.contains("temporarily unavailable")
    {
        ProviderError::Transient(stderr)
    } else if lower.contains("invalidparameter")
        || lower.contains("validationerror")
        || lower.contains("badrequest")
        || lower.contains("invalidresourcename")
    {
        ProviderError::InvalidParameters(stderr)
    } else {
        ProviderError::Api(stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmforge_cloud::ErrorClass;

    fn class(stderr: &str) -> ErrorClass {
        ErrorClass::of(&classify_stderr(stderr.to_string()))
    }

    #[test]
    fn throttling_and_conflicts_are_retryable() {
        assert_eq!(class("ERROR: (TooManyRequests) rate limited"), ErrorClass::Retryable);
        assert_eq!(
            class("ERROR: (AnotherOperationInProgress) wait for it"),
            ErrorClass::Retryable
        );
        assert_eq!(class("connection reset by peer"), ErrorClass::Retryable);
        assert_eq!(class("ERROR: (ServiceUnavailable)"), ErrorClass::Retryable);
    }

    #[test]
    fn quota_and_bad_parameters_are_fatal() {
        assert_eq!(
            class("ERROR: (QuotaExceeded) cores quota exhausted"),
            ErrorClass::QuotaExceeded
        );
        assert_eq!(
            class("ERROR: (InvalidParameter) unknown vm size"),
            ErrorClass::InvalidConfiguration
        );
        assert_eq!(class("something never seen before"), ErrorClass::InvalidConfiguration);
    }

    #[test]
    fn already_exists_is_detected() {
        assert_eq!(
            class("ERROR: A resource with name 'vnet-a' already exists"),
            ErrorClass::AlreadyExists
        );
    }
}
