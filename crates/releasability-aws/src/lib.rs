//! AWS adapters for releasability checks
//!
//! Implements the transport seams of `releasability-core` over the AWS
//! HTTP APIs, signed with Signature Version 4:
//! - SNS `Publish` and `ListSubscriptionsByTopic`
//! - SQS `ReceiveMessage`
//! - Lambda `ListFunctions`
//! - STS `GetCallerIdentity` to resolve the account id

pub mod arn;
pub mod client;
pub mod error;
pub mod lambda;
pub mod sigv4;
pub mod sns;
pub mod sqs;
pub mod sts;

use std::sync::Arc;

use releasability_core::{ReleasabilityConfig, TokioClock, Transport};
use tracing::info;

pub use arn::arn_to_sqs_url;
pub use client::AwsClient;
pub use error::AwsError;
pub use lambda::LambdaRegistry;
pub use sigv4::Credentials;
pub use sns::SnsClient;
pub use sqs::SqsQueue;
pub use sts::caller_account_id;

/// Result type for AWS operations
pub type Result<T> = std::result::Result<T, AwsError>;

/// Build the production transport for `config`.
///
/// Resolves `config.account_id` through STS when it is not set.
pub async fn connect(config: &mut ReleasabilityConfig) -> Result<Transport> {
    let client = AwsClient::from_env(config.region.clone())?;

    let account_id = match config.account_id.clone() {
        Some(id) => id,
        None => {
            let id = caller_account_id(&client).await?;
            config.account_id = Some(id.clone());
            id
        }
    };
    let queue_url = arn_to_sqs_url(&config.result_queue_arn(&account_id))?;
    info!(region = %config.region, %account_id, %queue_url, "Connected AWS transport");

    let sns = Arc::new(SnsClient::new(client.clone()));
    Ok(Transport {
        publisher: sns.clone(),
        queue: Arc::new(SqsQueue::new(client.clone(), queue_url)),
        handlers: Arc::new(LambdaRegistry::new(client)),
        subscriptions: sns,
        clock: Arc::new(TokioClock),
    })
}
