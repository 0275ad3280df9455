//! ARN helpers.

use crate::error::AwsError;
use crate::Result;

/// The fields of an ARN the adapters care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn<'a> {
    pub partition: &'a str,
    pub service: &'a str,
    pub region: &'a str,
    pub account_id: &'a str,
    pub resource: &'a str,
}

impl<'a> Arn<'a> {
    pub fn parse(arn: &'a str) -> Result<Self> {
        let mut parts = arn.splitn(6, ':');
        let prefix = parts.next();
        let (partition, service, region, account_id, resource) = match (
            prefix,
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some("arn"), Some(p), Some(s), Some(r), Some(a), Some(res)) => (p, s, r, a, res),
            _ => return Err(AwsError::InvalidArn(arn.to_string())),
        };
        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(AwsError::InvalidArn(arn.to_string()));
        }
        Ok(Self {
            partition,
            service,
            region,
            account_id,
            resource,
        })
    }
}

/// Queue URL for an SQS queue ARN
///
/// `arn:aws:sqs:eu-west-1:123:Queue` becomes
/// `https://sqs.eu-west-1.amazonaws.com/123/Queue`.
pub fn arn_to_sqs_url(arn: &str) -> Result<String> {
    let parsed = Arn::parse(arn)?;
    if parsed.service != "sqs" || parsed.region.is_empty() || parsed.account_id.is_empty() {
        return Err(AwsError::InvalidArn(arn.to_string()));
    }
    Ok(format!(
        "https://sqs.{}.amazonaws.com/{}/{}",
        parsed.region, parsed.account_id, parsed.resource
    ))
}
