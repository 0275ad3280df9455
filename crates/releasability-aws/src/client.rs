//! Signed HTTP calls to regional AWS endpoints.

use chrono::Utc;
use reqwest::Method;
use tracing::debug;

use crate::error::AwsError;
use crate::sigv4::{canonical_query, Credentials, SignableRequest, Signer};
use crate::Result;

/// One signed request to a regional service endpoint.
#[derive(Debug, Clone)]
pub struct ServiceRequest<'a> {
    /// Signing name, also the endpoint prefix (`sns`, `sqs`, `lambda`, `sts`).
    pub service: &'static str,
    pub method: Method,
    pub path: &'a str,
    pub query: &'a [(&'a str, &'a str)],
    pub headers: &'a [(&'a str, &'a str)],
    pub body: String,
}

/// HTTP client bound to one region and one set of credentials.
#[derive(Debug, Clone)]
pub struct AwsClient {
    http: reqwest::Client,
    credentials: Credentials,
    region: String,
}

impl AwsClient {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("releasability/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            credentials,
            region: region.into(),
        })
    }

    /// Create client from the standard AWS credential variables
    pub fn from_env(region: impl Into<String>) -> Result<Self> {
        Self::new(Credentials::from_env()?, region)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn host(&self, service: &str) -> String {
        format!("{}.{}.amazonaws.com", service, self.region)
    }

    /// Sign and send `request`; returns the response body of a 2xx answer.
    pub async fn send(&self, request: ServiceRequest<'_>) -> Result<String> {
        let host = self.host(request.service);
        let signer = Signer::new(self.credentials.clone(), &self.region, request.service);
        let auth_headers = signer.sign(
            &SignableRequest {
                method: request.method.as_str(),
                host: &host,
                path: request.path,
                query: request.query,
                headers: request.headers,
                payload: request.body.as_bytes(),
            },
            Utc::now(),
        )?;

        let mut url = format!("https://{}{}", host, request.path);
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query(request.query));
        }
        debug!(service = request.service, %url, "Sending AWS request");

        let mut builder = self.http.request(request.method, &url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(*name, *value);
        }
        for (name, value) in auth_headers {
            builder = builder.header(name, value);
        }
        let response = builder.body(request.body).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AwsError::Status {
                service: request.service,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
