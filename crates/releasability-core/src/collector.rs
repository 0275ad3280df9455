//! Poll loop collecting check replies from the shared result queue.
//!
//! The queue is pull-only and shared by every concurrent run, so each
//! iteration pulls a batch, keeps the non-ACK replies carrying this run's
//! correlation id, and upserts them by check name. The loop ends when the
//! number of *distinct* check names reaches the expected count, or when the
//! deadline fixed at loop entry has passed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::PollSettings;
use crate::context::CorrelationId;
use crate::directory::Expectation;
use crate::error::{ReleasabilityError, Result};
use crate::message::{decode_reply, RawMessage};
use crate::obs;
use crate::ports::{Clock, ResultQueue};
use crate::report::{CheckOutcome, CheckResultSet};

/// Collector state. `Done` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Waiting,
    Done,
    TimedOut,
}

/// Why a pulled message did not contribute to the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discard {
    Malformed,
    ForeignRun,
    Acknowledgement,
    Surplus,
}

impl Discard {
    fn as_str(self) -> &'static str {
        match self {
            Discard::Malformed => "malformed",
            Discard::ForeignRun => "foreign_run",
            Discard::Acknowledgement => "ack",
            Discard::Surplus => "surplus",
        }
    }
}

/// Accumulated replies of one run.
struct Collection<'a> {
    correlation_id: &'a CorrelationId,
    expected: usize,
    results: CheckResultSet,
}

impl<'a> Collection<'a> {
    fn new(correlation_id: &'a CorrelationId, expected: usize) -> Self {
        Self {
            correlation_id,
            expected,
            results: CheckResultSet::new(),
        }
    }

    fn absorb(&mut self, batch: Vec<RawMessage>) {
        for raw in batch {
            if let Err(reason) = self.absorb_one(&raw) {
                obs::emit_reply_discarded(&raw.message_id, reason.as_str());
            }
        }
    }

    fn absorb_one(&mut self, raw: &RawMessage) -> std::result::Result<(), Discard> {
        let reply = decode_reply(&raw.body).map_err(|e| {
            warn!(message_id = %raw.message_id, error = %e, "Dropping malformed result message");
            Discard::Malformed
        })?;
        if !reply.belongs_to(self.correlation_id) {
            return Err(Discard::ForeignRun);
        }
        if reply.state.is_ack() {
            debug!(check = %reply.check_name, "Check acknowledged trigger");
            return Err(Discard::Acknowledgement);
        }
        // The set never grows past the expected count; corrections still apply.
        if self.received() >= self.expected && self.results.get(&reply.check_name).is_none() {
            warn!(
                check = %reply.check_name,
                expected = self.expected,
                "Ignoring reply from a check beyond the expected count"
            );
            return Err(Discard::Surplus);
        }

        let check_name = reply.check_name.clone();
        let state = reply.state.to_string();
        self.results.upsert(CheckOutcome::from(reply));
        obs::emit_reply_received(
            self.correlation_id.as_str(),
            &check_name,
            &state,
            self.results.len(),
        );
        Ok(())
    }

    fn received(&self) -> usize {
        self.results.len()
    }

    /// Completion is judged on distinct names, never on messages seen.
    fn state(&self, iteration_start: Instant, deadline: Instant) -> CollectorState {
        if self.received() >= self.expected {
            CollectorState::Done
        } else if iteration_start >= deadline {
            CollectorState::TimedOut
        } else {
            CollectorState::Waiting
        }
    }
}

pub struct ResultCollector {
    queue: Arc<dyn ResultQueue>,
    clock: Arc<dyn Clock>,
    settings: PollSettings,
}

impl ResultCollector {
    pub fn new(queue: Arc<dyn ResultQueue>, clock: Arc<dyn Clock>, settings: PollSettings) -> Self {
        Self {
            queue,
            clock,
            settings,
        }
    }

    /// Poll until `expectation.count` distinct checks answered or
    /// `expectation.budget` has elapsed.
    ///
    /// Returns immediately, without polling, when no check is expected.
    pub async fn collect(
        &self,
        correlation_id: &CorrelationId,
        expectation: Expectation,
    ) -> Result<CheckResultSet> {
        let mut collection = Collection::new(correlation_id, expectation.count);
        if expectation.count == 0 {
            debug!("No releasability check subscribed; nothing to collect");
            return Ok(collection.results);
        }

        let deadline = self.clock.now() + expectation.budget;
        let interval = self.pause();

        loop {
            let iteration_start = self.clock.now();
            let batch = self
                .queue
                .receive(self.settings.batch_size, self.settings.wait)
                .await
                .map_err(ReleasabilityError::Receive)?;
            debug!(size = batch.len(), "Pulled result batch");
            collection.absorb(batch);

            match collection.state(iteration_start, deadline) {
                CollectorState::Done => return Ok(collection.results),
                CollectorState::TimedOut => {
                    obs::emit_timed_out(
                        correlation_id.as_str(),
                        collection.received(),
                        expectation.count,
                    );
                    return Err(ReleasabilityError::CollectionTimeout {
                        received: collection.received(),
                        expected: expectation.count,
                        budget: expectation.budget,
                    });
                }
                CollectorState::Waiting => self.clock.sleep(interval).await,
            }
        }
    }

    fn pause(&self) -> Duration {
        if self.settings.interval.is_zero() {
            PollSettings::default().interval
        } else {
            self.settings.interval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{reply_body, ManualClock, ScriptedQueue};
    use crate::message::CheckState;

    const RUN: &str = "b8e28245-3568-4257-970d-dcf47bd49ce5";
    const OTHER_RUN: &str = "2fe2a7f3-7910-407d-b5da-d72f68111a4e";

    fn msg(state: &str, run: &str, check: &str, message: Option<&str>) -> RawMessage {
        RawMessage {
            message_id: format!("{}-{}-{}", run, check, state),
            body: reply_body(state, run, check, message),
        }
    }

    fn collector(queue: Arc<ScriptedQueue>, clock: Arc<ManualClock>) -> ResultCollector {
        ResultCollector::new(queue, clock, PollSettings::default())
    }

    fn expect(count: usize, budget_secs: u64) -> Expectation {
        Expectation {
            count,
            budget: Duration::from_secs(budget_secs),
        }
    }

    #[tokio::test]
    async fn test_zero_expected_returns_without_polling() {
        let queue = Arc::new(ScriptedQueue::new());
        let clock = Arc::new(ManualClock::new());

        let results = collector(queue.clone(), clock)
            .collect(&CorrelationId::from_string(RUN), expect(0, 60))
            .await
            .expect("collect");
        assert!(results.is_empty());
        assert_eq!(queue.receive_calls(), 0);
    }

    #[tokio::test]
    async fn test_ack_then_verdicts() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![msg("ACK", RUN, "Jira", None)]);
        queue.push_batch(vec![msg("PASSED", RUN, "Jira", None)]);
        queue.push_batch(vec![msg("ERROR", RUN, "QualityGate", Some("msg"))]);

        let results = collector(queue.clone(), Arc::new(ManualClock::new()))
            .collect(&CorrelationId::from_string(RUN), expect(2, 60))
            .await
            .expect("collect");

        assert_eq!(results.len(), 2);
        assert_eq!(results.get("Jira").map(|o| &o.state), Some(&CheckState::Passed));
        assert_eq!(results.get("QualityGate").map(|o| &o.state), Some(&CheckState::Error));
        assert_eq!(queue.receive_calls(), 3);
    }

    #[tokio::test]
    async fn test_corrections_do_not_count_as_new_checks() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![
            msg("ERROR", RUN, "Jira", Some("no fix version")),
            msg("PASSED", RUN, "Jira", None),
        ]);
        queue.push_batch(vec![msg("PASSED", RUN, "QualityGate", None)]);

        let results = collector(queue.clone(), Arc::new(ManualClock::new()))
            .collect(&CorrelationId::from_string(RUN), expect(2, 60))
            .await
            .expect("collect");

        // Two messages for Jira must not finish a run expecting two checks.
        assert_eq!(queue.receive_calls(), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results.get("Jira").map(|o| &o.state), Some(&CheckState::Passed));
    }

    #[tokio::test]
    async fn test_done_when_distinct_names_reached_in_one_batch() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![
            msg("PASSED", RUN, "Jira", None),
            msg("NOT_RELEVANT", RUN, "Manifest", None),
        ]);
        queue.push_batch(vec![msg("PASSED", RUN, "Never", None)]);

        let results = collector(queue.clone(), Arc::new(ManualClock::new()))
            .collect(&CorrelationId::from_string(RUN), expect(2, 60))
            .await
            .expect("collect");
        assert_eq!(results.len(), 2);
        assert_eq!(queue.receive_calls(), 1);
    }

    #[tokio::test]
    async fn test_result_set_never_exceeds_expected() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![
            msg("PASSED", RUN, "Jira", None),
            msg("PASSED", RUN, "QualityGate", None),
            msg("PASSED", RUN, "Manifest", None),
            msg("ERROR", RUN, "Jira", Some("reopened")),
        ]);

        let results = collector(queue, Arc::new(ManualClock::new()))
            .collect(&CorrelationId::from_string(RUN), expect(2, 60))
            .await
            .expect("collect");

        assert_eq!(results.len(), 2);
        assert!(results.get("Manifest").is_none());
        // A correction of an admitted check still replaces its outcome.
        assert_eq!(results.get("Jira").map(|o| &o.state), Some(&CheckState::Error));
    }

    #[test]
    fn test_surplus_reply_is_discarded() {
        let id = CorrelationId::from_string(RUN);
        let mut collection = Collection::new(&id, 1);
        assert!(collection.absorb_one(&msg("PASSED", RUN, "Jira", None)).is_ok());
        assert_eq!(
            collection.absorb_one(&msg("PASSED", RUN, "Manifest", None)),
            Err(Discard::Surplus)
        );
        assert!(collection.absorb_one(&msg("ERROR", RUN, "Jira", None)).is_ok());
        assert_eq!(collection.received(), 1);
    }

    #[tokio::test]
    async fn test_acks_never_stored() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![
            msg("ACK", RUN, "Jira", None),
            msg("ACK", RUN, "Jira", None),
            msg("ACK", RUN, "QualityGate", None),
        ]);

        let clock = Arc::new(ManualClock::new());
        let err = collector(queue, clock)
            .collect(&CorrelationId::from_string(RUN), expect(1, 10))
            .await
            .expect_err("acks alone never complete a run");
        match err {
            ReleasabilityError::CollectionTimeout { received, .. } => assert_eq!(received, 0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_foreign_run_ignored_in_same_batch() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![
            msg("ERROR", OTHER_RUN, "QualityGate", Some("stale")),
            msg("PASSED", RUN, "Jira", None),
        ]);

        let results = collector(queue, Arc::new(ManualClock::new()))
            .collect(&CorrelationId::from_string(RUN), expect(1, 60))
            .await
            .expect("collect");
        assert_eq!(results.len(), 1);
        assert!(results.get("QualityGate").is_none());
    }

    #[tokio::test]
    async fn test_malformed_messages_do_not_stop_polling() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![
            RawMessage {
                message_id: "garbage".to_string(),
                body: "<html>".to_string(),
            },
            RawMessage {
                message_id: "bad-inner".to_string(),
                body: r#"{"Message":"{not json"}"#.to_string(),
            },
            msg("PASSED", RUN, "Jira", None),
        ]);

        let results = collector(queue, Arc::new(ManualClock::new()))
            .collect(&CorrelationId::from_string(RUN), expect(1, 60))
            .await
            .expect("collect");
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_reports_counts() {
        let queue = Arc::new(ScriptedQueue::new());
        queue.push_batch(vec![
            msg("PASSED", RUN, "Jira", None),
            msg("PASSED", RUN, "QualityGate", None),
        ]);

        let clock = Arc::new(ManualClock::new());
        let start = clock.now();
        let err = collector(queue.clone(), clock.clone())
            .collect(&CorrelationId::from_string(RUN), expect(3, 10))
            .await
            .expect_err("should time out");

        match err {
            ReleasabilityError::CollectionTimeout {
                received,
                expected,
                budget,
            } => {
                assert_eq!(received, 2);
                assert_eq!(expected, 3);
                assert_eq!(budget, Duration::from_secs(10));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(clock.now().duration_since(start) >= Duration::from_secs(10));
        // One poll per 2s interval from t=0 through t=10.
        assert_eq!(queue.receive_calls(), 6);
    }

    #[tokio::test]
    async fn test_receive_failure_is_fatal() {
        let queue = Arc::new(ScriptedQueue::failing());
        let err = collector(queue, Arc::new(ManualClock::new()))
            .collect(&CorrelationId::from_string(RUN), expect(1, 60))
            .await
            .expect_err("should fail");
        assert!(matches!(err, ReleasabilityError::Receive(_)));
    }

    #[test]
    fn test_state_transitions() {
        let id = CorrelationId::from_string(RUN);
        let mut collection = Collection::new(&id, 1);
        let now = Instant::now();
        let deadline = now + Duration::from_secs(5);

        assert_eq!(collection.state(now, deadline), CollectorState::Waiting);
        assert_eq!(collection.state(deadline, deadline), CollectorState::TimedOut);

        collection.absorb(vec![msg("PASSED", RUN, "Jira", None)]);
        // Done wins over a simultaneous deadline.
        assert_eq!(collection.state(deadline, deadline), CollectorState::Done);
    }
}
