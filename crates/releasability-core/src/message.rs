//! Wire contract shared by the trigger and the check replies.
//!
//! Replies arrive twice-encoded: the queue message body is a notification
//! document whose `Message` field is itself a JSON string holding the
//! [`CheckReply`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{CorrelationId, ReleaseContext};

// ============================================================================
// TRIGGER
// ============================================================================

/// Fan-out message asking every subscribed check to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(rename = "uuid")]
    pub correlation_id: String,

    /// Where checks publish their replies.
    #[serde(rename = "responseToARN")]
    pub reply_destination: String,

    #[serde(rename = "repoSlug")]
    pub repo_slug: String,

    pub version: String,

    #[serde(rename = "vcsRevision")]
    pub revision: String,

    #[serde(rename = "artifactoryBuildNumber")]
    pub build_number: u64,

    #[serde(rename = "branchName")]
    pub branch_name: String,
}

impl CheckRequest {
    pub fn new(
        context: &ReleaseContext,
        correlation_id: &CorrelationId,
        reply_destination: &str,
    ) -> Self {
        Self {
            correlation_id: correlation_id.as_str().to_string(),
            reply_destination: reply_destination.to_string(),
            repo_slug: context.repo_slug(),
            version: context.version().to_string(),
            revision: context.revision().to_string(),
            build_number: context.build_number(),
            branch_name: context.branch().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// REPLY
// ============================================================================

/// State reported by a check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheckState {
    /// Handshake: the check received the trigger. Never a final outcome.
    Ack,
    Passed,
    NotRelevant,
    Error,
    /// Any state this coordinator does not know; treated as blocking.
    Other(String),
}

impl CheckState {
    pub fn as_str(&self) -> &str {
        match self {
            CheckState::Ack => "ACK",
            CheckState::Passed => "PASSED",
            CheckState::NotRelevant => "NOT_RELEVANT",
            CheckState::Error => "ERROR",
            CheckState::Other(s) => s,
        }
    }

    /// PASSED and NOT_RELEVANT do not block a release.
    pub fn is_passing(&self) -> bool {
        matches!(self, CheckState::Passed | CheckState::NotRelevant)
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, CheckState::Ack)
    }
}

impl From<String> for CheckState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ACK" => CheckState::Ack,
            "PASSED" => CheckState::Passed,
            "NOT_RELEVANT" => CheckState::NotRelevant,
            "ERROR" => CheckState::Error,
            _ => CheckState::Other(s),
        }
    }
}

impl From<CheckState> for String {
    fn from(state: CheckState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload published by a check on the reply topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReply {
    #[serde(rename = "type")]
    pub state: CheckState,

    #[serde(rename = "requestUUID")]
    pub correlation_id: String,

    #[serde(rename = "checkName")]
    pub check_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckReply {
    pub fn belongs_to(&self, correlation_id: &CorrelationId) -> bool {
        self.correlation_id == correlation_id.as_str()
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Message pulled from the result queue, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: String,
    pub body: String,
}

/// Outer notification document. Only `Message` matters here.
#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("message body is not a notification document: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("notification does not carry a check reply: {0}")]
    Payload(#[source] serde_json::Error),
}

/// Unwrap a queue message body into the reply it carries.
pub fn decode_reply(body: &str) -> Result<CheckReply, EnvelopeError> {
    let notification: Notification =
        serde_json::from_str(body).map_err(EnvelopeError::Envelope)?;
    serde_json::from_str(&notification.message).map_err(EnvelopeError::Payload)
}

/// Wrap a reply the way the reply topic delivers it to the queue.
pub fn encode_reply(reply: &CheckReply) -> serde_json::Result<String> {
    let inner = serde_json::to_string(reply)?;
    serde_json::to_string(&serde_json::json!({
        "Type": "Notification",
        "Message": inner,
    }))
}
