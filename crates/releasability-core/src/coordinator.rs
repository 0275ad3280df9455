//! Releasability check run orchestration.

use std::sync::Arc;

use tracing::{info, Instrument};

use crate::collector::ResultCollector;
use crate::config::ReleasabilityConfig;
use crate::context::{CorrelationId, ReleaseContext};
use crate::directory::CheckDirectory;
use crate::error::{ReleasabilityError, Result};
use crate::obs;
use crate::ports::{Clock, HandlerRegistry, ResultQueue, SubscriptionRegistry, TopicPublisher};
use crate::report::{aggregate, ChecksReport};
use crate::trigger::CheckTrigger;

/// Transport adapters used by a coordinator.
#[derive(Clone)]
pub struct Transport {
    pub publisher: Arc<dyn TopicPublisher>,
    pub queue: Arc<dyn ResultQueue>,
    pub handlers: Arc<dyn HandlerRegistry>,
    pub subscriptions: Arc<dyn SubscriptionRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// Runs releasability checks for one release.
///
/// A run publishes one trigger, discovers how many checks are subscribed,
/// polls their replies and turns them into a verdict. Steps run strictly in
/// sequence; the caller is blocked until the verdict is known.
pub struct Coordinator {
    trigger: CheckTrigger,
    directory: CheckDirectory,
    collector: ResultCollector,
}

impl Coordinator {
    /// Build a coordinator. `config.account_id` must be resolved.
    pub fn new(config: &ReleasabilityConfig, transport: Transport) -> Result<Self> {
        config.validate()?;
        let account_id = config.account_id.as_deref().ok_or_else(|| {
            ReleasabilityError::InvalidConfig("account id is not resolved".to_string())
        })?;
        let trigger_topic_arn = config.trigger_topic_arn(account_id);

        Ok(Self {
            trigger: CheckTrigger::new(
                transport.publisher,
                trigger_topic_arn.clone(),
                config.result_topic_arn(account_id),
            ),
            directory: CheckDirectory::new(
                transport.handlers,
                transport.subscriptions,
                trigger_topic_arn,
            ),
            collector: ResultCollector::new(transport.queue, transport.clock, config.poll.clone()),
        })
    }

    /// Run all checks and return the report.
    ///
    /// Fails with [`ReleasabilityError::ChecksFailed`] when a check blocks the
    /// release, or with an infrastructure error when the run did not complete.
    pub async fn check(&self, context: &ReleaseContext) -> Result<ChecksReport> {
        let correlation_id = CorrelationId::generate();
        let span = obs::run_span(correlation_id.as_str());
        async {
            self.publish(context, &correlation_id).await?;
            self.verdict(&correlation_id).await
        }
        .instrument(span)
        .await
    }

    /// Publish the trigger for `context` and return the run's correlation id.
    pub async fn start(&self, context: &ReleaseContext) -> Result<CorrelationId> {
        let correlation_id = CorrelationId::generate();
        self.publish(context, &correlation_id)
            .instrument(obs::run_span(correlation_id.as_str()))
            .await?;
        Ok(correlation_id)
    }

    /// Wait for the replies of a run started with [`start`](Self::start).
    pub async fn poll(&self, correlation_id: &CorrelationId) -> Result<ChecksReport> {
        self.verdict(correlation_id)
            .instrument(obs::run_span(correlation_id.as_str()))
            .await
    }

    async fn verdict(&self, correlation_id: &CorrelationId) -> Result<ChecksReport> {
        let expectation = self.directory.expected_check_count_and_timeout_budget().await?;
        info!(
            expected = expectation.count,
            budget_secs = expectation.budget.as_secs(),
            "Waiting for releasability check results"
        );

        let results = self.collector.collect(correlation_id, expectation).await?;
        let report = aggregate(results);
        obs::emit_finished(correlation_id.as_str(), report.outcomes.len(), report.passed);

        if report.passed {
            Ok(report)
        } else {
            Err(ReleasabilityError::ChecksFailed {
                report: report.report,
            })
        }
    }

    async fn publish(&self, context: &ReleaseContext, correlation_id: &CorrelationId) -> Result<()> {
        obs::emit_started(correlation_id.as_str(), &context.to_string());
        info!("Starting releasability check: {}", context);
        let message_id = self.trigger.publish(context, correlation_id).await?;
        info!(
            "Issued trigger message {}; the request identifier is {}",
            message_id, correlation_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{
        ManualClock, MemoryHandlerRegistry, MemorySubscriptionRegistry, MemoryTopic, ScriptedQueue,
    };

    fn transport(topic: Arc<MemoryTopic>) -> Transport {
        Transport {
            publisher: topic,
            queue: Arc::new(ScriptedQueue::new()),
            handlers: Arc::new(MemoryHandlerRegistry::new(vec![])),
            subscriptions: Arc::new(MemorySubscriptionRegistry::new(vec![])),
            clock: Arc::new(ManualClock::new()),
        }
    }

    #[test]
    fn test_requires_account_id() {
        let err = Coordinator::new(
            &ReleasabilityConfig::default(),
            transport(Arc::new(MemoryTopic::new())),
        )
        .err()
        .expect("should reject");
        assert!(matches!(err, ReleasabilityError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_start_publishes_to_configured_topic() {
        let topic = Arc::new(MemoryTopic::new());
        let config = ReleasabilityConfig::default().with_account_id("597611216173");
        let coordinator = Coordinator::new(&config, transport(topic.clone())).expect("coordinator");

        let context = ReleaseContext::from_request(
            crate::context::ReleaseRequest {
                organization: "sonar".to_string(),
                project: "sonar-dummy".to_string(),
                version: "5.4.3.42".to_string(),
                revision: "abc".to_string(),
                branch: "master".to_string(),
                build_number: 42,
            },
            &config.normalization,
        );
        let id = coordinator.start(&context).await.expect("start");

        let published = topic.published();
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].0,
            "arn:aws:sns:eu-west-1:597611216173:ReleasabilityTriggerTopic"
        );
        assert!(published[0].1.contains(id.as_str()));
        assert!(published[0]
            .1
            .contains("arn:aws:sns:eu-west-1:597611216173:ReleasabilityResultTopic"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_poll_logs_inside_run_span() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let config = ReleasabilityConfig::default().with_account_id("597611216173");
        let coordinator =
            Coordinator::new(&config, transport(Arc::new(MemoryTopic::new()))).expect("coordinator");
        let context = ReleaseContext::from_request(
            crate::context::ReleaseRequest {
                organization: "sonar".to_string(),
                project: "sonar-dummy".to_string(),
                version: "5.4.3.42".to_string(),
                revision: "abc".to_string(),
                branch: "master".to_string(),
                build_number: 42,
            },
            &config.normalization,
        );
        let id = coordinator.start(&context).await.expect("start");
        coordinator.poll(&id).await.expect("poll");

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).expect("utf8");
        let line = logs
            .lines()
            .find(|l| l.contains("Waiting for releasability check results"))
            .expect("poll logged");
        assert!(line.contains(&format!("releasability.run{{correlation_id={}}}", id)));
    }
}
