//! Check run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::VersionNormalization;
use crate::error::{ReleasabilityError, Result};

pub const DEFAULT_REGION: &str = "eu-west-1";
pub const DEFAULT_TRIGGER_TOPIC: &str = "ReleasabilityTriggerTopic";
pub const DEFAULT_RESULT_TOPIC: &str = "ReleasabilityResultTopic";
pub const DEFAULT_RESULT_QUEUE: &str = "ReleasabilityResultQueue";

/// Largest batch the queue will hand out in one receive.
pub const MAX_POLL_BATCH: usize = 10;

/// Poll loop tuning. None of these values affect protocol semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub batch_size: usize,
    pub wait: Duration,
    /// Pause between iterations. Must be non-zero.
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_POLL_BATCH,
            wait: Duration::from_secs(1),
            interval: Duration::from_secs(2),
        }
    }
}

/// Where the check infrastructure lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasabilityConfig {
    pub region: String,

    /// Discovered from the caller identity when not set.
    pub account_id: Option<String>,

    pub trigger_topic: String,
    pub result_topic: String,
    pub result_queue: String,

    pub poll: PollSettings,

    pub normalization: VersionNormalization,
}

impl Default for ReleasabilityConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            account_id: None,
            trigger_topic: DEFAULT_TRIGGER_TOPIC.to_string(),
            result_topic: DEFAULT_RESULT_TOPIC.to_string(),
            result_queue: DEFAULT_RESULT_QUEUE.to_string(),
            poll: PollSettings::default(),
            normalization: VersionNormalization::default(),
        }
    }
}

impl ReleasabilityConfig {
    /// Build from `RELEASABILITY_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(region) = non_empty("RELEASABILITY_AWS_REGION")
            .or_else(|| non_empty("AWS_REGION"))
            .or_else(|| non_empty("AWS_DEFAULT_REGION"))
        {
            config.region = region;
        }
        config.account_id = non_empty("RELEASABILITY_AWS_ACCOUNT_ID");
        if let Some(topic) = non_empty("RELEASABILITY_TRIGGER_TOPIC") {
            config.trigger_topic = topic;
        }
        if let Some(topic) = non_empty("RELEASABILITY_RESULT_TOPIC") {
            config.result_topic = topic;
        }
        if let Some(queue) = non_empty("RELEASABILITY_RESULT_QUEUE") {
            config.result_queue = queue;
        }
        if let Some(secs) =
            non_empty("RELEASABILITY_POLL_INTERVAL_SECS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.poll.interval = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(ReleasabilityError::InvalidConfig(
                "region is empty".to_string(),
            ));
        }
        for (field, value) in [
            ("trigger_topic", &self.trigger_topic),
            ("result_topic", &self.result_topic),
            ("result_queue", &self.result_queue),
        ] {
            if value.trim().is_empty() {
                return Err(ReleasabilityError::InvalidConfig(format!(
                    "{} is empty",
                    field
                )));
            }
        }
        if self.poll.interval.is_zero() {
            return Err(ReleasabilityError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if self.poll.batch_size == 0 || self.poll.batch_size > MAX_POLL_BATCH {
            return Err(ReleasabilityError::InvalidConfig(format!(
                "poll batch size must be within 1..={}",
                MAX_POLL_BATCH
            )));
        }
        Ok(())
    }

    pub fn trigger_topic_arn(&self, account_id: &str) -> String {
        format!("arn:aws:sns:{}:{}:{}", self.region, account_id, self.trigger_topic)
    }

    pub fn result_topic_arn(&self, account_id: &str) -> String {
        format!("arn:aws:sns:{}:{}:{}", self.region, account_id, self.result_topic)
    }

    pub fn result_queue_arn(&self, account_id: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", self.region, account_id, self.result_queue)
    }
}
