//! Fan-out publish of the check request.

use std::sync::Arc;

use tracing::debug;

use crate::context::{CorrelationId, ReleaseContext};
use crate::error::{ReleasabilityError, Result, TransportError};
use crate::message::CheckRequest;
use crate::obs;
use crate::ports::TopicPublisher;

/// Publishes the single trigger message of a check run.
pub struct CheckTrigger {
    publisher: Arc<dyn TopicPublisher>,
    trigger_topic_arn: String,
    reply_topic_arn: String,
}

impl CheckTrigger {
    pub fn new(
        publisher: Arc<dyn TopicPublisher>,
        trigger_topic_arn: impl Into<String>,
        reply_topic_arn: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            trigger_topic_arn: trigger_topic_arn.into(),
            reply_topic_arn: reply_topic_arn.into(),
        }
    }

    /// Build the request for this run without sending it.
    pub fn request(&self, context: &ReleaseContext, correlation_id: &CorrelationId) -> CheckRequest {
        CheckRequest::new(context, correlation_id, &self.reply_topic_arn)
    }

    /// Publish exactly one trigger. Not retried: any failure aborts the run.
    pub async fn publish(
        &self,
        context: &ReleaseContext,
        correlation_id: &CorrelationId,
    ) -> Result<String> {
        let request = self.request(context, correlation_id);
        let body = request
            .to_json()
            .map_err(|e| ReleasabilityError::Publish(TransportError::from(e)))?;

        debug!(topic = %self.trigger_topic_arn, body = %body, "Publishing releasability trigger");

        let message_id = self
            .publisher
            .publish(&self.trigger_topic_arn, &body)
            .await
            .map_err(ReleasabilityError::Publish)?;

        obs::emit_triggered(correlation_id.as_str(), &message_id);
        Ok(message_id)
    }
}
