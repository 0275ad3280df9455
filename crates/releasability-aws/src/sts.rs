//! STS adapter: resolves the account id of the calling credentials.

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use crate::client::{AwsClient, ServiceRequest};
use crate::error::AwsError;
use crate::sigv4::form_body;
use crate::Result;

const SERVICE: &str = "sts";
const API_VERSION: &str = "2011-06-15";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityEnvelope {
    get_caller_identity_response: IdentityResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityResponse {
    get_caller_identity_result: IdentityResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityResult {
    account: Option<String>,
}

pub fn parse_caller_identity(body: &str) -> Result<String> {
    let envelope: IdentityEnvelope = serde_json::from_str(body)?;
    envelope
        .get_caller_identity_response
        .get_caller_identity_result
        .account
        .filter(|a| !a.is_empty())
        .ok_or(AwsError::MissingField {
            service: SERVICE,
            field: "Account",
        })
}

/// Account id owning the client's credentials.
pub async fn caller_account_id(client: &AwsClient) -> Result<String> {
    let body = client
        .send(ServiceRequest {
            service: SERVICE,
            method: Method::POST,
            path: "/",
            query: &[],
            headers: &[
                ("Content-Type", "application/x-www-form-urlencoded; charset=utf-8"),
                ("Accept", "application/json"),
            ],
            body: form_body(&[("Action", "GetCallerIdentity"), ("Version", API_VERSION)]),
        })
        .await?;
    let account = parse_caller_identity(&body)?;
    debug!(%account, "Resolved AWS account id");
    Ok(account)
}
