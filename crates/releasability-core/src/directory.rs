//! Run-time discovery of the checks expected to answer.
//!
//! The set of checks is whatever is deployed *and* subscribed to the
//! trigger topic at the time of the run; nothing here knows check names.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{ReleasabilityError, Result};
use crate::obs;
use crate::ports::{CheckHandler, HandlerRegistry, SubscriptionRegistry};

/// How many distinct checks to wait for, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    pub count: usize,
    /// Largest execution allowance among all deployed handlers.
    pub budget: Duration,
}

pub struct CheckDirectory {
    handlers: Arc<dyn HandlerRegistry>,
    subscriptions: Arc<dyn SubscriptionRegistry>,
    trigger_topic_arn: String,
}

impl CheckDirectory {
    pub fn new(
        handlers: Arc<dyn HandlerRegistry>,
        subscriptions: Arc<dyn SubscriptionRegistry>,
        trigger_topic_arn: impl Into<String>,
    ) -> Self {
        Self {
            handlers,
            subscriptions,
            trigger_topic_arn: trigger_topic_arn.into(),
        }
    }

    /// Count the handlers subscribed to the trigger topic and compute the
    /// timeout budget. Both listings are fully drained first.
    pub async fn expected_check_count_and_timeout_budget(&self) -> Result<Expectation> {
        let handlers = self.all_handlers().await?;
        let endpoints = self.all_subscriber_endpoints().await?;

        let count = handlers
            .iter()
            .filter(|h| endpoints.contains(h.arn.as_str()))
            .count();
        let budget = handlers
            .iter()
            .map(|h| h.timeout)
            .max()
            .unwrap_or(Duration::ZERO);

        obs::emit_directory(count, handlers.len(), budget);
        Ok(Expectation { count, budget })
    }

    async fn all_handlers(&self) -> Result<Vec<CheckHandler>> {
        let mut handlers = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self
                .handlers
                .list_handlers(marker.as_deref())
                .await
                .map_err(ReleasabilityError::Discovery)?;
            debug!(count = page.handlers.len(), "Listed handler page");
            handlers.extend(page.handlers);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(handlers)
    }

    async fn all_subscriber_endpoints(&self) -> Result<HashSet<String>> {
        let mut endpoints = HashSet::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .subscriptions
                .list_subscribers(&self.trigger_topic_arn, token.as_deref())
                .await
                .map_err(ReleasabilityError::Discovery)?;
            debug!(count = page.endpoints.len(), "Listed subscriber page");
            endpoints.extend(page.endpoints);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(endpoints)
    }
}
