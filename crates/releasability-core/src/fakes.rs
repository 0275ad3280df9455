//! In-memory fakes for the transport ports (testing only)
//!
//! Provide the publisher, result queue, registries and a virtual clock so a
//! complete check run can execute without a network or real sleeps.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::message::{encode_reply, CheckReply, CheckState, RawMessage};
use crate::ports::*;

/// Envelope body for a reply, as the result queue delivers it.
pub fn reply_body(state: &str, correlation_id: &str, check_name: &str, message: Option<&str>) -> String {
    let reply = CheckReply {
        state: CheckState::from(state.to_string()),
        correlation_id: correlation_id.to_string(),
        check_name: check_name.to_string(),
        message: message.map(|m| m.to_string()),
    };
    // Serializing plain strings cannot fail.
    encode_reply(&reply).unwrap_or_default()
}

fn unavailable(what: &str) -> TransportError {
    TransportError::Status {
        status: 503,
        body: format!("{} unavailable", what),
    }
}

// ---------------------------------------------------------------------------
// MemoryTopic
// ---------------------------------------------------------------------------

/// Records every published `(topic, message)` pair.
#[derive(Debug, Default)]
pub struct MemoryTopic {
    published: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl MemoryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish is rejected.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicPublisher for MemoryTopic {
    async fn publish(&self, topic_arn: &str, message: &str) -> TransportResult<String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(unavailable("topic"));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic_arn.to_string(), message.to_string()));
        Ok(format!("msg-{}", attempt))
    }
}

// ---------------------------------------------------------------------------
// ScriptedQueue
// ---------------------------------------------------------------------------

/// Hands out pre-loaded batches in order, then empty batches forever.
#[derive(Debug, Default)]
pub struct ScriptedQueue {
    batches: Mutex<VecDeque<Vec<RawMessage>>>,
    receive_calls: AtomicUsize,
    fail: bool,
}

impl ScriptedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every receive is rejected.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn push_batch(&self, batch: Vec<RawMessage>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultQueue for ScriptedQueue {
    async fn receive(&self, max_batch: usize, _wait: Duration) -> TransportResult<Vec<RawMessage>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(unavailable("queue"));
        }
        let mut batches = self.batches.lock().unwrap();
        let mut batch = batches.pop_front().unwrap_or_default();
        if batch.len() > max_batch {
            let rest = batch.split_off(max_batch);
            batches.push_front(rest);
        }
        Ok(batch)
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

fn page_of<T: Clone>(items: &[T], cursor: Option<&str>, page_size: usize) -> (Vec<T>, Option<String>) {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + page_size).min(items.len());
    let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| end.to_string());
    (page, next)
}

/// Handler registry over a fixed list, optionally paginated.
#[derive(Debug)]
pub struct MemoryHandlerRegistry {
    handlers: Vec<CheckHandler>,
    page_size: usize,
    fail: bool,
}

impl MemoryHandlerRegistry {
    pub fn new(handlers: Vec<CheckHandler>) -> Self {
        let page_size = handlers.len().max(1);
        Self {
            handlers,
            page_size,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            handlers: Vec::new(),
            page_size: 1,
            fail: true,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl HandlerRegistry for MemoryHandlerRegistry {
    async fn list_handlers(&self, marker: Option<&str>) -> TransportResult<HandlerPage> {
        if self.fail {
            return Err(unavailable("handler registry"));
        }
        let (handlers, next_marker) = page_of(&self.handlers, marker, self.page_size);
        Ok(HandlerPage {
            handlers,
            next_marker,
        })
    }
}

/// Subscription registry over a fixed endpoint list, optionally paginated.
#[derive(Debug)]
pub struct MemorySubscriptionRegistry {
    endpoints: Vec<String>,
    page_size: usize,
    fail: bool,
}

impl MemorySubscriptionRegistry {
    pub fn new(endpoints: Vec<String>) -> Self {
        let page_size = endpoints.len().max(1);
        Self {
            endpoints,
            page_size,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            endpoints: Vec::new(),
            page_size: 1,
            fail: true,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl SubscriptionRegistry for MemorySubscriptionRegistry {
    async fn list_subscribers(
        &self,
        _topic_arn: &str,
        next_token: Option<&str>,
    ) -> TransportResult<SubscriberPage> {
        if self.fail {
            return Err(unavailable("subscription registry"));
        }
        let (endpoints, next_token) = page_of(&self.endpoints, next_token, self.page_size);
        Ok(SubscriberPage {
            endpoints,
            next_token,
        })
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Virtual clock: `sleep` advances time instantly.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap() += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
