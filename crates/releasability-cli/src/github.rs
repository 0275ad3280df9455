//! GitHub Actions event handling: release request extraction and revocation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use releasability_core::ReleaseRequest;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

pub const ALLOWED_EVENTS: [&str; 2] = ["release", "workflow_dispatch"];
pub const DEFAULT_BRANCH: &str = "master";
pub const DRY_RUN_VERSION: &str = "?.?.?.????";
const USER_AGENT: &str = concat!("releasability/", env!("CARGO_PKG_VERSION"));

/// X.X.X.BUILD, X.X.X-MX.BUILD or X.X.X+BUILD; captures the build number.
static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(?:-M\d+)?[.+](\d+)$").expect("tag regex is valid")
});

static COMMIT_SHA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{40}$").expect("sha regex is valid"));

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error(
        "The action was neither triggered on release or workflow_dispatch events (is: '{0}'), nor with dry_run=true"
    )]
    UnsupportedEvent(String),

    #[error("GITHUB_EVENT_PATH is not set")]
    MissingEventPath,

    #[error("Failed to read GitHub event {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GitHub event payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Repository name is not owner/name: {0}")]
    InvalidRepository(String),

    #[error("The event carries neither a release tag nor a version input")]
    MissingVersion,

    #[error("GitHub API error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("The event does not carry {0}; cannot revoke the release")]
    MissingUrl(&'static str),

    #[error(
        "The tag must follow this pattern: X.X.X.BUILD_NUMBER or X.X.X-MX.BUILD_NUMBER or X.X.X+BUILD_NUMBER (is: '{0}')"
    )]
    InvalidVersion(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubEvent {
    pub repository: Repository,
    #[serde(default)]
    pub release: Option<Release>,
    #[serde(default)]
    pub inputs: Option<DispatchInputs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    /// Template such as `https://api.github.com/repos/o/p/git/refs{/sha}`.
    #[serde(default)]
    pub git_refs_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub url: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub target_commitish: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchInputs {
    #[serde(default)]
    pub version: Option<String>,
}

/// The Actions variables this module reads.
#[derive(Debug, Clone, Default)]
pub struct ActionsEnv {
    pub event_name: Option<String>,
    pub event_path: Option<PathBuf>,
    pub sha: Option<String>,
}

impl ActionsEnv {
    pub fn from_env() -> Self {
        Self {
            event_name: std::env::var("GITHUB_EVENT_NAME").ok(),
            event_path: std::env::var_os("GITHUB_EVENT_PATH").map(PathBuf::from),
            sha: std::env::var("GITHUB_SHA").ok(),
        }
    }

    /// Load the event payload; only release and manual dispatch events are
    /// accepted unless running dry.
    pub fn load_event(&self, dry_run: bool) -> Result<GitHubEvent, GitHubError> {
        let name = self.event_name.as_deref().unwrap_or_default();
        if !dry_run && !ALLOWED_EVENTS.contains(&name) {
            return Err(GitHubError::UnsupportedEvent(name.to_string()));
        }
        let path = self.event_path.as_deref().ok_or(GitHubError::MissingEventPath)?;
        read_event(path)
    }

    pub fn revision(&self) -> String {
        self.sha.clone().unwrap_or_default()
    }
}

pub fn read_event(path: &Path) -> Result<GitHubEvent, GitHubError> {
    let raw = std::fs::read_to_string(path).map_err(|source| GitHubError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn split_repository(full_name: &str) -> Result<(String, String), GitHubError> {
    match full_name.split_once('/') {
        Some((org, project)) if !org.is_empty() && !project.is_empty() && !project.contains('/') => {
            Ok((org.to_string(), project.to_string()))
        }
        _ => Err(GitHubError::InvalidRepository(full_name.to_string())),
    }
}

/// Build number captured from a release tag.
pub fn build_number(version: &str) -> Result<u64, GitHubError> {
    TAG_REGEX
        .captures(version)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| GitHubError::InvalidVersion(version.to_string()))
}

fn branch_of(release: Option<&Release>) -> String {
    match release.and_then(|r| r.target_commitish.as_deref()) {
        Some(target) if !target.is_empty() && !COMMIT_SHA_REGEX.is_match(target) => {
            target.to_string()
        }
        _ => DEFAULT_BRANCH.to_string(),
    }
}

impl GitHubEvent {
    /// Release request for the tag of a release event, or the version input
    /// of a manual dispatch.
    pub fn release_request(&self, revision: &str) -> Result<ReleaseRequest, GitHubError> {
        let (organization, project) = split_repository(&self.repository.full_name)?;
        let version = match &self.release {
            Some(release) => release.tag_name.clone(),
            None => self
                .inputs
                .as_ref()
                .and_then(|i| i.version.clone())
                .ok_or(GitHubError::MissingVersion)?,
        };
        let build_number = build_number(&version)?;

        Ok(ReleaseRequest {
            organization,
            project,
            version,
            revision: revision.to_string(),
            branch: branch_of(self.release.as_ref()),
            build_number,
        })
    }

    /// Placeholder request used when running dry.
    pub fn dry_run_request(&self, revision: &str) -> Result<ReleaseRequest, GitHubError> {
        let (organization, project) = split_repository(&self.repository.full_name)?;
        Ok(ReleaseRequest {
            organization,
            project,
            version: DRY_RUN_VERSION.to_string(),
            revision: revision.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            build_number: 0,
        })
    }
}

/// Calls needed to take a blocked release back: turn it into a draft, then
/// delete its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    pub release_url: String,
    pub tag_ref_url: String,
    pub tag_name: String,
}

pub fn tag_ref_url(git_refs_url: &str, tag_name: &str) -> String {
    git_refs_url.replace("{/sha}", &format!("/tags/{}", tag_name))
}

impl GitHubEvent {
    /// `None` for events without a release (manual dispatch).
    pub fn revocation(&self) -> Result<Option<Revocation>, GitHubError> {
        let Some(release) = &self.release else {
            return Ok(None);
        };
        let release_url = release
            .url
            .clone()
            .ok_or(GitHubError::MissingUrl("release.url"))?;
        let git_refs_url = self
            .repository
            .git_refs_url
            .as_deref()
            .ok_or(GitHubError::MissingUrl("repository.git_refs_url"))?;
        Ok(Some(Revocation {
            release_url,
            tag_ref_url: tag_ref_url(git_refs_url, &release.tag_name),
            tag_name: release.tag_name.clone(),
        }))
    }
}

/// GitHub REST client authenticated with the workflow token.
#[derive(Debug, Clone)]
pub struct ReleaseRevoker {
    http: reqwest::Client,
    token: String,
}

impl ReleaseRevoker {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    /// `None` when `GITHUB_TOKEN` is missing or empty.
    pub fn from_token(token: Option<String>) -> Option<Self> {
        token.filter(|t| !t.trim().is_empty()).map(Self::new)
    }

    pub async fn revoke(&self, revocation: &Revocation) -> Result<(), GitHubError> {
        self.http
            .patch(&revocation.release_url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", USER_AGENT)
            .json(&json!({"draft": true, "tag_name": revocation.tag_name}))
            .send()
            .await?
            .error_for_status()?;
        self.http
            .delete(&revocation.tag_ref_url)
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Revoke the release of `event`; errors are logged and swallowed.
pub async fn revoke_release(revoker: Option<&ReleaseRevoker>, event: &GitHubEvent) {
    let revocation = match event.revocation() {
        Ok(Some(revocation)) => revocation,
        Ok(None) => return,
        Err(e) => {
            warn!("Could not revoke release: {}", e);
            return;
        }
    };
    let Some(revoker) = revoker else {
        warn!(tag = %revocation.tag_name, "GITHUB_TOKEN not set; release left published");
        return;
    };
    match revoker.revoke(&revocation).await {
        Ok(()) => info!(tag = %revocation.tag_name, "Release reverted to draft and tag deleted"),
        Err(e) => warn!(tag = %revocation.tag_name, "Could not revoke release: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn event(value: serde_json::Value) -> GitHubEvent {
        serde_json::from_value(value).expect("event")
    }

    #[test]
    fn test_build_number_patterns() {
        assert_eq!(build_number("5.4.3.77").expect("dotted"), 77);
        assert_eq!(build_number("10.0.0-M2.1234").expect("milestone"), 1234);
        assert_eq!(build_number("1.2.3+77").expect("semver"), 77);
        assert!(build_number("1.2.77").is_err());
        assert!(build_number("v1.2.3.4").is_err());
        assert!(build_number("1.2.3-RC1.4").is_err());
    }

    #[test]
    fn test_release_event() {
        let request = event(json!({
            "repository": {"full_name": "SonarSource/sonar-dummy"},
            "release": {"tag_name": "5.4.3.77", "target_commitish": "branch-5.4"}
        }))
        .release_request("abc123")
        .expect("request");

        assert_eq!(request.organization, "SonarSource");
        assert_eq!(request.project, "sonar-dummy");
        assert_eq!(request.version, "5.4.3.77");
        assert_eq!(request.build_number, 77);
        assert_eq!(request.branch, "branch-5.4");
        assert_eq!(request.revision, "abc123");
    }

    #[test]
    fn test_commit_target_falls_back_to_default_branch() {
        let request = event(json!({
            "repository": {"full_name": "SonarSource/sonar-dummy"},
            "release": {
                "tag_name": "5.4.3.77",
                "target_commitish": "0123456789abcdef0123456789abcdef01234567"
            }
        }))
        .release_request("abc123")
        .expect("request");
        assert_eq!(request.branch, DEFAULT_BRANCH);
    }

    #[test]
    fn test_workflow_dispatch_uses_version_input() {
        let request = event(json!({
            "repository": {"full_name": "SonarSource/sonarlint-vscode"},
            "inputs": {"version": "1.2.3+77"}
        }))
        .release_request("abc123")
        .expect("request");
        assert_eq!(request.version, "1.2.3+77");
        assert_eq!(request.branch, DEFAULT_BRANCH);
    }

    #[test]
    fn test_rejects_bad_tag() {
        let err = event(json!({
            "repository": {"full_name": "SonarSource/sonar-dummy"},
            "release": {"tag_name": "latest"}
        }))
        .release_request("abc123")
        .expect_err("bad tag");
        assert!(matches!(err, GitHubError::InvalidVersion(v) if v == "latest"));
    }

    #[test]
    fn test_rejects_missing_version() {
        let err = event(json!({"repository": {"full_name": "SonarSource/sonar-dummy"}}))
            .release_request("abc123")
            .expect_err("no version");
        assert!(matches!(err, GitHubError::MissingVersion));
    }

    #[test]
    fn test_dry_run_request() {
        let request = event(json!({"repository": {"full_name": "SonarSource/sonar-dummy"}}))
            .dry_run_request("abc123")
            .expect("request");
        assert_eq!(request.version, DRY_RUN_VERSION);
        assert_eq!(request.branch, DEFAULT_BRANCH);
    }

    #[test]
    fn test_load_event_filters_event_name() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "{}",
            json!({"repository": {"full_name": "SonarSource/sonar-dummy"}})
        )
        .expect("write");

        let env = ActionsEnv {
            event_name: Some("push".to_string()),
            event_path: Some(file.path().to_path_buf()),
            sha: None,
        };
        assert!(matches!(
            env.load_event(false),
            Err(GitHubError::UnsupportedEvent(name)) if name == "push"
        ));
        let loaded = env.load_event(true).expect("dry run accepts any event");
        assert_eq!(loaded.repository.full_name, "SonarSource/sonar-dummy");

        let release_env = ActionsEnv {
            event_name: Some("release".to_string()),
            ..env
        };
        assert!(release_env.load_event(false).is_ok());
    }

    #[test]
    fn test_missing_event_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = ActionsEnv {
            event_name: Some("release".to_string()),
            event_path: Some(dir.path().join("event.json")),
            sha: None,
        };
        assert!(matches!(env.load_event(false), Err(GitHubError::Io { .. })));
    }

    #[test]
    fn test_invalid_repository_name() {
        let err = event(json!({
            "repository": {"full_name": "sonar-dummy"},
            "release": {"tag_name": "5.4.3.77"}
        }))
        .release_request("abc")
        .expect_err("no owner");
        assert!(matches!(err, GitHubError::InvalidRepository(_)));
    }

    #[test]
    fn test_revocation_targets_release_and_tag() {
        let revocation = event(json!({
            "repository": {
                "full_name": "SonarSource/sonar-dummy",
                "git_refs_url": "https://api.github.com/repos/SonarSource/sonar-dummy/git/refs{/sha}"
            },
            "release": {
                "url": "https://api.github.com/repos/SonarSource/sonar-dummy/releases/1",
                "tag_name": "5.4.3.77"
            }
        }))
        .revocation()
        .expect("revocation")
        .expect("release event");

        assert_eq!(
            revocation.release_url,
            "https://api.github.com/repos/SonarSource/sonar-dummy/releases/1"
        );
        assert_eq!(
            revocation.tag_ref_url,
            "https://api.github.com/repos/SonarSource/sonar-dummy/git/refs/tags/5.4.3.77"
        );
        assert_eq!(revocation.tag_name, "5.4.3.77");
    }

    #[test]
    fn test_dispatch_has_nothing_to_revoke() {
        let revocation = event(json!({
            "repository": {"full_name": "SonarSource/sonar-dummy"},
            "inputs": {"version": "5.4.3.77"}
        }))
        .revocation()
        .expect("revocation");
        assert!(revocation.is_none());
    }

    #[test]
    fn test_revocation_requires_urls() {
        let err = event(json!({
            "repository": {"full_name": "SonarSource/sonar-dummy"},
            "release": {"tag_name": "5.4.3.77"}
        }))
        .revocation()
        .expect_err("no url");
        assert!(matches!(err, GitHubError::MissingUrl("release.url")));
    }

    #[test]
    fn test_revoker_requires_token() {
        assert!(ReleaseRevoker::from_token(None).is_none());
        assert!(ReleaseRevoker::from_token(Some(String::new())).is_none());
        assert!(ReleaseRevoker::from_token(Some("ghs_x".to_string())).is_some());
    }

    #[tokio::test]
    async fn test_revoke_without_token_is_not_fatal() {
        let release = event(json!({
            "repository": {
                "full_name": "SonarSource/sonar-dummy",
                "git_refs_url": "https://api.github.com/repos/SonarSource/sonar-dummy/git/refs{/sha}"
            },
            "release": {
                "url": "https://api.github.com/repos/SonarSource/sonar-dummy/releases/1",
                "tag_name": "5.4.3.77"
            }
        }));
        revoke_release(None, &release).await;
    }
}
