//! Error types for releasability-core

use std::time::Duration;

use thiserror::Error;

/// Errors raised by transport adapters (publish, receive, list).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request could not be sent or the connection failed
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Remote service answered with a non-success status
    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Credentials missing or unusable
    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    /// Resource name could not be parsed
    #[error("Invalid ARN: {0}")]
    InvalidArn(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

/// Errors surfaced by a releasability check run.
///
/// `ChecksFailed` is the ordinary "red build" outcome: every check answered
/// and at least one said no. Every other variant means the protocol itself
/// did not complete.
#[derive(Error, Debug)]
pub enum ReleasabilityError {
    /// Publishing the trigger message failed; the run is aborted.
    #[error("Failed to publish releasability trigger: {0}")]
    Publish(#[source] TransportError),

    /// Listing check handlers or trigger subscribers failed.
    #[error("Failed to discover releasability checks: {0}")]
    Discovery(#[source] TransportError),

    /// Pulling from the result queue failed.
    #[error("Failed to receive releasability results: {0}")]
    Receive(#[source] TransportError),

    /// Fewer distinct checks answered than expected before the deadline.
    #[error(
        "Releasability checks timed out after {budget:?}: received {received} of {expected} expected results"
    )]
    CollectionTimeout {
        received: usize,
        expected: usize,
        budget: Duration,
    },

    /// At least one check reported a blocking outcome.
    #[error("Releasability checks failed:\n{report}")]
    ChecksFailed { report: String },

    /// Configuration rejected before any call was made.
    #[error("Invalid releasability configuration: {0}")]
    InvalidConfig(String),
}

impl ReleasabilityError {
    /// True when a check reported a failure (as opposed to an infrastructure problem).
    pub fn is_check_failure(&self) -> bool {
        matches!(self, ReleasabilityError::ChecksFailed { .. })
    }

    /// True when the check run could not be carried out to completion.
    pub fn is_infrastructure(&self) -> bool {
        !self.is_check_failure()
    }
}

/// Result type for releasability operations
pub type Result<T> = std::result::Result<T, ReleasabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_failed_is_check_failure() {
        let err = ReleasabilityError::ChecksFailed {
            report: "\u{274c} Jira - missing fix version".to_string(),
        };
        assert!(err.is_check_failure());
        assert!(!err.is_infrastructure());
        assert!(err.to_string().contains("Jira - missing fix version"));
    }

    #[test]
    fn test_timeout_is_infrastructure() {
        let err = ReleasabilityError::CollectionTimeout {
            received: 2,
            expected: 3,
            budget: Duration::from_secs(900),
        };
        assert!(err.is_infrastructure());
        let msg = err.to_string();
        assert!(msg.contains("received 2 of 3"));
    }

    #[test]
    fn test_publish_error_keeps_source() {
        let err = ReleasabilityError::Publish(TransportError::Status {
            status: 403,
            body: "AuthorizationError".to_string(),
        });
        assert!(err.is_infrastructure());
        assert!(err.to_string().contains("403"));
    }
}
