//! GitHub Actions environment: run context, step outputs, failure annotations.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;

use crate::core::types::RunQuery;

/// Run status used when listing past runs.
pub const SUCCESS_STATUS: &str = "success";

const MULTILINE_DELIMITER: &str = "ghadelimiter_tag_range";

/// Invocation context supplied by the hosting environment.
///
/// Values are collected once at start (flags or `GITHUB_*` / `INPUT_*`
/// variables) and never re-read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionContext {
    /// Trigger-type signal (`GITHUB_REF_TYPE`).
    pub ref_type: Option<String>,
    /// Explicit base reference (`INPUT_BASE_TAG`).
    pub base_tag: Option<String>,
    /// `owner/name` (`GITHUB_REPOSITORY`).
    pub repository: Option<String>,
    /// Workflow ref or name (`GITHUB_WORKFLOW_REF` / `GITHUB_WORKFLOW`).
    pub workflow: Option<String>,
    /// Triggering event kind (`GITHUB_EVENT_NAME`).
    pub event_name: Option<String>,
    /// Path of the webhook payload (`GITHUB_EVENT_PATH`).
    pub event_path: Option<PathBuf>,
}

impl ActionContext {
    /// Explicit base reference, trimmed; empty input counts as absent.
    pub fn explicit_base(&self) -> Option<&str> {
        non_empty(self.base_tag.as_deref())
    }

    /// Workflow id usable in the REST path: the last `/` segment of the
    /// workflow ref with any `@ref` suffix removed.
    pub fn workflow_id(&self) -> Option<&str> {
        let workflow = non_empty(self.workflow.as_deref())?;
        let path = workflow.split_once('@').map_or(workflow, |(path, _)| path);
        non_empty(path.rsplit('/').next())
    }

    /// Query for past successful runs of this workflow.
    ///
    /// Returns `Ok(None)` when the repository, workflow, or event kind is not
    /// available (e.g. outside GitHub Actions).
    pub fn run_query(&self) -> Result<Option<RunQuery>> {
        let (Some(repository), Some(workflow), Some(event)) = (
            non_empty(self.repository.as_deref()),
            self.workflow_id(),
            non_empty(self.event_name.as_deref()),
        ) else {
            return Ok(None);
        };
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| anyhow!("invalid repository '{repository}' (expected owner/name)"))?;
        Ok(Some(RunQuery {
            owner: owner.to_string(),
            repo: repo.to_string(),
            workflow: workflow.to_string(),
            event: event.to_string(),
            status: SUCCESS_STATUS.to_string(),
        }))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Channel for step outputs. Each output is set at most once per run.
pub trait OutputSink {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Appends outputs to the file named by `GITHUB_OUTPUT`.
#[derive(Debug, Clone)]
pub struct GithubOutputFile {
    path: PathBuf,
}

impl GithubOutputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputSink for GithubOutputFile {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        let line = format_output(name, value)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open output file {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("write output {name} to {}", self.path.display()))
    }
}

/// Prints outputs as `name=value` lines when no output file is configured.
#[derive(Debug, Default)]
pub struct StdoutOutputs;

impl OutputSink for StdoutOutputs {
    fn set_output(&mut self, name: &str, value: &str) -> Result<()> {
        print!("{}", format_output(name, value)?);
        Ok(())
    }
}

/// Render one output entry in the `GITHUB_OUTPUT` file format.
pub fn format_output(name: &str, value: &str) -> Result<String> {
    if name.is_empty() || name.contains(['=', '\n', '\r']) {
        bail!("invalid output name '{name}'");
    }
    if !value.contains(['\n', '\r']) {
        return Ok(format!("{name}={value}\n"));
    }
    if value.contains(MULTILINE_DELIMITER) {
        bail!("output {name} contains the reserved delimiter");
    }
    Ok(format!(
        "{name}<<{MULTILINE_DELIMITER}\n{value}\n{MULTILINE_DELIMITER}\n"
    ))
}

/// Report a failure as an `::error::` workflow command on stdout.
pub fn report_failure(message: &str) {
    println!("{}", error_command(message));
}

fn error_command(message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{escaped}")
}

/// Read the webhook payload that triggered the run.
pub fn read_event_payload(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}
