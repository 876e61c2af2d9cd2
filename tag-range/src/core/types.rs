//! Shared deterministic types for base/head resolution.
//!
//! These types carry no I/O. Adapters in [`crate::io`] translate collaborator
//! payloads (git output, GitHub API JSON) into them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque commit identifier as reported by the version-control system.
///
/// Never validated for well-formedness; only surrounding whitespace from
/// subprocess output is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One past workflow run, as reported by the run-history collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: u64,
    /// Workflow name the run belongs to.
    pub name: Option<String>,
    /// Commit the run was executed against.
    pub head_sha: CommitId,
    pub event: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One-line summary used when logging the run that was picked.
impl fmt::Display for RunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {}", self.id)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        if let Some(event) = &self.event {
            write!(f, " on {event}")?;
        }
        match (&self.status, &self.conclusion) {
            (Some(status), Some(conclusion)) => write!(f, " {status}/{conclusion}")?,
            (Some(state), None) | (None, Some(state)) => write!(f, " {state}")?,
            (None, None) => {}
        }
        write!(f, " at {}", self.head_sha)
    }
}

/// Parameters for listing past runs of the current workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub owner: String,
    pub repo: String,
    /// Workflow file name (e.g. `release.yml`) or numeric id.
    pub workflow: String,
    /// Event kind of the current trigger (e.g. `push`).
    pub event: String,
    pub status: String,
}

/// Which step of the priority chain produced the base commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseSource {
    /// Resolved from the user-provided `base_tag` reference.
    Explicit,
    /// Commit of the latest successful run that is exactly a tag.
    LatestTaggedRun,
    /// Parentless first commit of the repository.
    RootCommit,
}

impl BaseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BaseSource::Explicit => "explicit",
            BaseSource::LatestTaggedRun => "latest_tagged_run",
            BaseSource::RootCommit => "root_commit",
        }
    }
}

impl fmt::Display for BaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base commit chosen by the resolver together with the step that chose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub base: CommitId,
    pub source: BaseSource,
}

/// What to do when an explicit `base_tag` cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnBaseTagError {
    /// Propagate the resolution error and fail the run.
    #[default]
    Fail,
    /// Log a warning and continue with the latest tagged run lookup.
    Fallback,
}

impl FromStr for OnBaseTagError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(OnBaseTagError::Fail),
            "fallback" => Ok(OnBaseTagError::Fallback),
            other => Err(format!(
                "invalid on_base_tag_error '{other}' (expected 'fail' or 'fallback')"
            )),
        }
    }
}
