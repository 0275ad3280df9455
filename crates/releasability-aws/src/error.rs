//! Error types for releasability-aws

use releasability_core::TransportError;
use thiserror::Error;

/// Errors that can occur while talking to AWS
#[derive(Error, Debug)]
pub enum AwsError {
    /// Request could not be sent
    #[error("HTTP error: {0}")]
    Http(String),

    /// Service answered with a non-success status
    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response parsed but a required field was absent
    #[error("Unexpected {service} response: missing {field}")]
    MissingField {
        service: &'static str,
        field: &'static str,
    },

    /// No usable credentials in the environment
    #[error("AWS credentials not configured: {0}")]
    MissingCredentials(String),

    /// ARN is malformed or names the wrong service
    #[error("Invalid ARN: {0}")]
    InvalidArn(String),
}

impl From<reqwest::Error> for AwsError {
    fn from(err: reqwest::Error) -> Self {
        AwsError::Http(err.to_string())
    }
}

impl From<AwsError> for TransportError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Http(msg) => TransportError::Http(msg),
            AwsError::Status { status, body, .. } => TransportError::Status { status, body },
            AwsError::Json(e) => TransportError::Decode(e.to_string()),
            e @ AwsError::MissingField { .. } => TransportError::Decode(e.to_string()),
            AwsError::MissingCredentials(msg) => TransportError::Credentials(msg),
            AwsError::InvalidArn(arn) => TransportError::InvalidArn(arn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_keeps_code_and_body() {
        let err: TransportError = AwsError::Status {
            service: "sns",
            status: 403,
            body: "AccessDenied".to_string(),
        }
        .into();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "AccessDenied");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_missing_field_is_decode_error() {
        let err: TransportError = AwsError::MissingField {
            service: "sqs",
            field: "Messages",
        }
        .into();
        assert!(matches!(err, TransportError::Decode(msg) if msg.contains("Messages")));
    }
}
