//! Slack notification of failed releases.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack rejected the message: {0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts to one channel with a bot token.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    token: String,
    channel: String,
}

impl SlackNotifier {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            channel: channel.into(),
        }
    }

    /// Notifier from `SLACK_API_TOKEN` and the channel input; `None` when
    /// either is missing or empty.
    pub fn from_parts(token: Option<String>, channel: Option<String>) -> Option<Self> {
        let token = token.filter(|t| !t.trim().is_empty())?;
        let channel = channel.filter(|c| !c.trim().is_empty())?;
        Some(Self::new(token, channel))
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn post(&self, text: &str) -> Result<(), NotifyError> {
        let response: PostMessageResponse = self
            .http
            .post(POST_MESSAGE_URL)
            .bearer_auth(&self.token)
            .json(&PostMessage {
                channel: &self.channel,
                text,
            })
            .send()
            .await?
            .json()
            .await?;
        check_response(response)
    }
}

fn check_response(response: PostMessageResponse) -> Result<(), NotifyError> {
    if response.ok {
        Ok(())
    } else {
        Err(NotifyError::Rejected(
            response.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

pub fn failure_message(project: &str, version: &str) -> String {
    format!("Released {}:{} failed", project, version)
}

/// Notify about a failed release; errors are logged and swallowed.
pub async fn notify_failure(notifier: Option<&SlackNotifier>, text: &str) {
    let Some(notifier) = notifier else {
        return;
    };
    match notifier.post(text).await {
        Ok(()) => info!(channel = notifier.channel(), "Notified Slack"),
        Err(e) => warn!("Could not notify slack: {}", e),
    }
}
