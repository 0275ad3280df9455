//! Transport seams for the check run
//!
//! These traits define what the coordinator needs from the outside world:
//! - `TopicPublisher`: fan-out publish of the trigger
//! - `ResultQueue`: pull-only access to the shared reply queue
//! - `HandlerRegistry` / `SubscriptionRegistry`: paginated discovery of checks
//! - `Clock`: monotonic time and sleeping, so polling can run on virtual time
//!
//! Production adapters live in `releasability-aws`; in-memory fakes for
//! tests are in the `fakes` module.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::message::RawMessage;

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

// ---------------------------------------------------------------------------
// Pub/sub
// ---------------------------------------------------------------------------

/// Publishes a message to a topic and returns the transport's message id.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, topic_arn: &str, message: &str) -> TransportResult<String>;
}

/// Pull side of the shared result queue.
///
/// A batch may contain replies of any concurrent run; callers filter.
#[async_trait]
pub trait ResultQueue: Send + Sync {
    async fn receive(&self, max_batch: usize, wait: Duration) -> TransportResult<Vec<RawMessage>>;
}

// ---------------------------------------------------------------------------
// Check discovery
// ---------------------------------------------------------------------------

/// A deployed check handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHandler {
    pub name: String,
    pub arn: String,
    /// Maximum execution time allowed to the handler.
    pub timeout: Duration,
}

/// One page of handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerPage {
    pub handlers: Vec<CheckHandler>,
    pub next_marker: Option<String>,
}

/// One page of trigger topic subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberPage {
    /// Subscription endpoints (handler ARNs for function subscriptions).
    pub endpoints: Vec<String>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait HandlerRegistry: Send + Sync {
    async fn list_handlers(&self, marker: Option<&str>) -> TransportResult<HandlerPage>;
}

#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    async fn list_subscribers(
        &self,
        topic_arn: &str,
        next_token: Option<&str>,
    ) -> TransportResult<SubscriberPage>;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Monotonic time source used by the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
