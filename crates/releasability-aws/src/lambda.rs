//! Lambda adapter: lists deployed functions as check handlers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use releasability_core::{CheckHandler, HandlerPage, HandlerRegistry, TransportResult};

use crate::client::{AwsClient, ServiceRequest};
use crate::Result;

const SERVICE: &str = "lambda";
const LIST_FUNCTIONS_PATH: &str = "/2015-03-31/functions/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListFunctionsResponse {
    #[serde(default)]
    functions: Vec<FunctionConfiguration>,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionConfiguration {
    function_name: String,
    function_arn: String,
    /// Seconds; Lambda's own default applies when absent.
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 {
    3
}

/// One page of handlers from a `ListFunctions` answer.
pub fn parse_functions_response(body: &str) -> Result<HandlerPage> {
    let response: ListFunctionsResponse = serde_json::from_str(body)?;
    Ok(HandlerPage {
        handlers: response
            .functions
            .into_iter()
            .map(|f| CheckHandler {
                name: f.function_name,
                arn: f.function_arn,
                timeout: Duration::from_secs(f.timeout),
            })
            .collect(),
        next_marker: response.next_marker.filter(|m| !m.is_empty()),
    })
}

/// Every function in the account and region is a candidate handler.
#[derive(Debug, Clone)]
pub struct LambdaRegistry {
    client: AwsClient,
}

impl LambdaRegistry {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HandlerRegistry for LambdaRegistry {
    async fn list_handlers(&self, marker: Option<&str>) -> TransportResult<HandlerPage> {
        let query: Vec<(&str, &str)> = marker.map(|m| ("Marker", m)).into_iter().collect();
        let body = self
            .client
            .send(ServiceRequest {
                service: SERVICE,
                method: Method::GET,
                path: LIST_FUNCTIONS_PATH,
                query: &query,
                headers: &[],
                body: String::new(),
            })
            .await?;
        Ok(parse_functions_response(&body)?)
    }
}
