//! Releasability - GitHub Actions release gate
//!
//! The `releasability` command runs every deployed releasability check for
//! the release described by the triggering GitHub event and fails the step
//! when a check blocks the release.
//!
//! ## Environment
//!
//! - `GITHUB_EVENT_NAME`, `GITHUB_EVENT_PATH`, `GITHUB_SHA`: the release
//! - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`: transport credentials
//! - `RELEASABILITY_*`: topic, queue, region and polling overrides
//! - `INPUT_DRY_RUN`, `INPUT_SLACK_CHANNEL`, `SLACK_API_TOKEN`, `GITHUB_OUTPUT`
//! - `GITHUB_TOKEN`: reverts a blocked release to draft and deletes its tag

mod github;
mod notify;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use releasability_core::{
    CheckRequest, ChecksReport, Coordinator, CorrelationId, ReleasabilityConfig, ReleaseContext,
};
use tracing::{info, Level};

use crate::github::{revoke_release, ActionsEnv, GitHubEvent, ReleaseRevoker};
use crate::notify::{failure_message, notify_failure, SlackNotifier};
use crate::output::set_output;

const DRY_RUN_DISCLAIMER: &str = "
===
DRY RUN
releasability has been invoked with input `dry_run=true`.
It won't actually do anything having impacts, but will still report what would have been done.
===
";

#[derive(Parser)]
#[command(name = "releasability")]
#[command(author = "Release Engineering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run releasability checks for a GitHub release", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Report what would be done without calling any check
    #[arg(
        long,
        env = "INPUT_DRY_RUN",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_switch
    )]
    dry_run: bool,

    /// AWS region hosting the releasability topics and queue
    #[arg(long)]
    region: Option<String>,

    /// AWS account id (resolved from the credentials when omitted)
    #[arg(long)]
    account_id: Option<String>,

    /// Name of the trigger topic
    #[arg(long)]
    trigger_topic: Option<String>,

    /// Name of the result topic checks reply to
    #[arg(long)]
    result_topic: Option<String>,

    /// Name of the result queue
    #[arg(long)]
    result_queue: Option<String>,

    /// Seconds between two polls of the result queue
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Step output file
    #[arg(long, env = "GITHUB_OUTPUT")]
    github_output: Option<PathBuf>,

    /// Slack channel notified when the release is blocked
    #[arg(long, env = "INPUT_SLACK_CHANNEL")]
    slack_channel: Option<String>,

    /// Slack bot token
    #[arg(long, env = "SLACK_API_TOKEN", hide_env_values = true)]
    slack_token: Option<String>,

    /// Token used to revoke a blocked release
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

/// Action inputs are strings; only a case-insensitive `true` enables a switch.
fn parse_switch(value: &str) -> Result<bool, String> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

impl Cli {
    fn config(&self) -> Result<ReleasabilityConfig> {
        let mut config = ReleasabilityConfig::from_env();
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(account_id) = &self.account_id {
            config.account_id = Some(account_id.clone());
        }
        if let Some(topic) = &self.trigger_topic {
            config.trigger_topic = topic.clone();
        }
        if let Some(topic) = &self.result_topic {
            config.result_topic = topic.clone();
        }
        if let Some(queue) = &self.result_queue {
            config.result_queue = queue.clone();
        }
        if let Some(secs) = self.poll_interval_secs {
            config.poll.interval = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    releasability_core::init_tracing(cli.json, level);

    let mut config = cli.config().context("Invalid releasability configuration")?;
    let actions = ActionsEnv::from_env();
    let event = actions
        .load_event(cli.dry_run)
        .context("Failed to read the GitHub event")?;

    if cli.dry_run {
        return cmd_dry_run(&cli, &config, &event, &actions);
    }

    let request = event.release_request(&actions.revision())?;
    let context = ReleaseContext::from_request(request, &config.normalization);
    let notifier = SlackNotifier::from_parts(cli.slack_token.clone(), cli.slack_channel.clone());
    let revoker = ReleaseRevoker::from_token(cli.github_token.clone());

    match cmd_check(&mut config, &context).await {
        Ok(report) => {
            println!("{}", report);
            info!("All releasability checks passed");
            set_output(cli.github_output.as_deref(), "releasability", "done")?;
            Ok(())
        }
        Err(e) => {
            let text = format!("{}\n{:#}", failure_notice(&context), e);
            notify_failure(notifier.as_ref(), &text).await;
            revoke_release(revoker.as_ref(), &event).await;
            Err(e)
        }
    }
}

/// Headline of the failure notice, naming the version the checks ran on.
fn failure_notice(context: &ReleaseContext) -> String {
    failure_message(context.project(), context.version())
}

async fn cmd_check(config: &mut ReleasabilityConfig, context: &ReleaseContext) -> Result<ChecksReport> {
    let transport = releasability_aws::connect(config)
        .await
        .context("Failed to set up the AWS transport")?;
    let coordinator = Coordinator::new(config, transport)?;
    Ok(coordinator.check(context).await?)
}

fn cmd_dry_run(
    cli: &Cli,
    config: &ReleasabilityConfig,
    event: &GitHubEvent,
    actions: &ActionsEnv,
) -> Result<()> {
    println!("{}", DRY_RUN_DISCLAIMER);

    let request = event.dry_run_request(&actions.revision())?;
    let context = ReleaseContext::from_request(request, &config.normalization);
    let account_id = config.account_id.as_deref().unwrap_or("<account>");
    let trigger = CheckRequest::new(
        &context,
        &CorrelationId::generate(),
        &config.result_topic_arn(account_id),
    );

    info!("Starting releasability check: {} (--dry-run)", context);
    info!(
        "Would publish to {}: {} (--dry-run)",
        config.trigger_topic_arn(account_id),
        trigger.to_json()?
    );
    set_output(cli.github_output.as_deref(), "releasability", "done")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use releasability_core::{ReleaseRequest, VersionNormalization};

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("true"), Ok(true));
        assert_eq!(parse_switch("TRUE"), Ok(true));
        assert_eq!(parse_switch("false"), Ok(false));
        assert_eq!(parse_switch("yes"), Ok(false));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "releasability",
            "--region",
            "us-east-1",
            "--account-id",
            "123456789012",
            "--result-queue",
            "OtherQueue",
            "--poll-interval-secs",
            "5",
        ]);
        let config = cli.config().expect("config");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.account_id.as_deref(), Some("123456789012"));
        assert_eq!(config.result_queue, "OtherQueue");
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(
            config.result_queue_arn("123456789012"),
            "arn:aws:sqs:us-east-1:123456789012:OtherQueue"
        );
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let cli = Cli::parse_from(["releasability", "--poll-interval-secs", "0"]);
        assert!(cli.config().is_err());
    }

    #[test]
    fn test_dry_run_flag() {
        let cli = Cli::parse_from(["releasability", "--dry-run"]);
        assert!(cli.dry_run);
        let cli = Cli::parse_from(["releasability", "--dry-run", "false"]);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_failure_notice_uses_normalized_version() {
        let request = ReleaseRequest {
            organization: "SonarSource".to_string(),
            project: "sonarlint-vscode".to_string(),
            version: "1.2.3+77".to_string(),
            revision: "434343443efdcaaa123232".to_string(),
            branch: "master".to_string(),
            build_number: 77,
        };
        let context = ReleaseContext::from_request(request, &VersionNormalization::default());
        assert_eq!(failure_notice(&context), "Released sonarlint-vscode:1.2.3 failed");
    }

    #[test]
    fn test_github_token_flag() {
        let cli = Cli::parse_from(["releasability", "--github-token", "ghs_x"]);
        assert_eq!(cli.github_token.as_deref(), Some("ghs_x"));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
