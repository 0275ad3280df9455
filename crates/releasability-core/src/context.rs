//! Release identity and per-run correlation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw release identity as read from the triggering event.
///
/// This is not used directly on the wire: it must go through
/// [`ReleaseContext::from_request`] so the version is normalized once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub organization: String,
    pub project: String,
    pub version: String,
    pub revision: String,
    pub branch: String,
    pub build_number: u64,
}

/// Projects whose release version carries a `+build` suffix that checks
/// must not see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionNormalization {
    pub strip_build_suffix: Vec<String>,
}

impl Default for VersionNormalization {
    fn default() -> Self {
        Self {
            strip_build_suffix: vec!["sonarlint-vscode".to_string()],
        }
    }
}

impl VersionNormalization {
    /// No project is normalized.
    pub fn none() -> Self {
        Self {
            strip_build_suffix: Vec::new(),
        }
    }

    /// Normalize `version` for `project`.
    pub fn apply(&self, project: &str, version: &str) -> String {
        if self.strip_build_suffix.iter().any(|p| p == project) {
            match version.split_once('+') {
                Some((base, _)) => base.to_string(),
                None => version.to_string(),
            }
        } else {
            version.to_string()
        }
    }
}

/// Immutable identity of one release attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseContext {
    organization: String,
    project: String,
    version: String,
    revision: String,
    branch: String,
    build_number: u64,
}

impl ReleaseContext {
    /// Build the context, applying version normalization.
    pub fn from_request(request: ReleaseRequest, normalization: &VersionNormalization) -> Self {
        let version = normalization.apply(&request.project, &request.version);
        Self {
            organization: request.organization,
            project: request.project,
            version,
            revision: request.revision,
            branch: request.branch,
            build_number: request.build_number,
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Normalized version, the only form ever transmitted or compared.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    /// `organization/project`
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.organization, self.project)
    }
}

impl std::fmt::Display for ReleaseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.project, self.version)
    }
}

/// Token tying a trigger message to the replies of one check run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Fresh random id (UUID v4).
    pub fn generate() -> Self {
        CorrelationId(Uuid::new_v4().to_string())
    }

    /// Wrap an id produced elsewhere (e.g. by an earlier `start`).
    pub fn from_string(id: impl Into<String>) -> Self {
        CorrelationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
