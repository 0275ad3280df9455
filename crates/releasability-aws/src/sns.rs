//! SNS adapter: trigger publishing and trigger-topic subscriber listing.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use releasability_core::{SubscriberPage, SubscriptionRegistry, TopicPublisher, TransportResult};

use crate::client::{AwsClient, ServiceRequest};
use crate::error::AwsError;
use crate::sigv4::form_body;
use crate::Result;

const SERVICE: &str = "sns";
const API_VERSION: &str = "2010-03-31";
const FORM_HEADERS: &[(&str, &str)] = &[
    ("Content-Type", "application/x-www-form-urlencoded; charset=utf-8"),
    ("Accept", "application/json"),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PublishEnvelope {
    publish_response: PublishResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PublishResponse {
    publish_result: PublishResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PublishResult {
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEnvelope {
    list_subscriptions_by_topic_response: ListResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListResponse {
    list_subscriptions_by_topic_result: ListResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListResult {
    #[serde(default)]
    subscriptions: Option<Vec<Subscription>>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Subscription {
    endpoint: Option<String>,
}

/// Message id from a JSON `Publish` answer.
pub fn parse_publish_response(body: &str) -> Result<String> {
    let envelope: PublishEnvelope = serde_json::from_str(body)?;
    envelope
        .publish_response
        .publish_result
        .message_id
        .ok_or(AwsError::MissingField {
            service: SERVICE,
            field: "MessageId",
        })
}

/// Subscriber endpoints and continuation token from a JSON
/// `ListSubscriptionsByTopic` answer.
pub fn parse_subscriptions_response(body: &str) -> Result<SubscriberPage> {
    let envelope: ListEnvelope = serde_json::from_str(body)?;
    let result = envelope
        .list_subscriptions_by_topic_response
        .list_subscriptions_by_topic_result;
    Ok(SubscriberPage {
        endpoints: result
            .subscriptions
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| s.endpoint)
            .collect(),
        next_token: result.next_token.filter(|t| !t.is_empty()),
    })
}

/// SNS client over the query API.
#[derive(Debug, Clone)]
pub struct SnsClient {
    client: AwsClient,
}

impl SnsClient {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<String> {
        self.client
            .send(ServiceRequest {
                service: SERVICE,
                method: Method::POST,
                path: "/",
                query: &[],
                headers: FORM_HEADERS,
                body: form_body(params),
            })
            .await
    }
}

#[async_trait]
impl TopicPublisher for SnsClient {
    async fn publish(&self, topic_arn: &str, message: &str) -> TransportResult<String> {
        let body = self
            .call(&[
                ("Action", "Publish"),
                ("Version", API_VERSION),
                ("TopicArn", topic_arn),
                ("Message", message),
            ])
            .await?;
        let message_id = parse_publish_response(&body)?;
        debug!(topic = topic_arn, %message_id, "Published to topic");
        Ok(message_id)
    }
}

#[async_trait]
impl SubscriptionRegistry for SnsClient {
    async fn list_subscribers(
        &self,
        topic_arn: &str,
        next_token: Option<&str>,
    ) -> TransportResult<SubscriberPage> {
        let mut params = vec![
            ("Action", "ListSubscriptionsByTopic"),
            ("Version", API_VERSION),
            ("TopicArn", topic_arn),
        ];
        if let Some(token) = next_token {
            params.push(("NextToken", token));
        }
        let body = self.call(&params).await?;
        Ok(parse_subscriptions_response(&body)?)
    }
}
