//! SQS adapter: pull side of the result queue.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use releasability_core::config::MAX_POLL_BATCH;
use releasability_core::{RawMessage, ResultQueue, TransportResult};

use crate::client::{AwsClient, ServiceRequest};
use crate::Result;

const SERVICE: &str = "sqs";
const JSON_HEADERS: &[(&str, &str)] = &[
    ("Content-Type", "application/x-amz-json-1.0"),
    ("X-Amz-Target", "AmazonSQS.ReceiveMessage"),
];
/// Upper bound SQS accepts for long polling.
const MAX_WAIT_SECS: u64 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest<'a> {
    queue_url: &'a str,
    max_number_of_messages: usize,
    wait_time_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Message {
    message_id: String,
    #[serde(default)]
    body: String,
}

/// Request body for `ReceiveMessage`, with batch size and wait clamped to
/// what SQS accepts.
pub fn receive_request_body(queue_url: &str, max_batch: usize, wait: Duration) -> Result<String> {
    Ok(serde_json::to_string(&ReceiveMessageRequest {
        queue_url,
        max_number_of_messages: max_batch.clamp(1, MAX_POLL_BATCH),
        wait_time_seconds: wait.as_secs().min(MAX_WAIT_SECS),
    })?)
}

/// Messages from a `ReceiveMessage` answer; an empty queue has no
/// `Messages` key at all.
pub fn parse_receive_response(body: &str) -> Result<Vec<RawMessage>> {
    let response: ReceiveMessageResponse = serde_json::from_str(body)?;
    Ok(response
        .messages
        .into_iter()
        .map(|m| RawMessage {
            message_id: m.message_id,
            body: m.body,
        })
        .collect())
}

/// The shared result queue. Messages are never deleted here.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: AwsClient,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: AwsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl ResultQueue for SqsQueue {
    async fn receive(&self, max_batch: usize, wait: Duration) -> TransportResult<Vec<RawMessage>> {
        let body = receive_request_body(&self.queue_url, max_batch, wait)?;
        let response = self
            .client
            .send(ServiceRequest {
                service: SERVICE,
                method: Method::POST,
                path: "/",
                query: &[],
                headers: JSON_HEADERS,
                body,
            })
            .await?;
        Ok(parse_receive_response(&response)?)
    }
}
