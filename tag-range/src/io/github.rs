//! Run-history adapter backed by the GitHub Actions REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::core::types::{CommitId, RunQuery, RunRecord};
use crate::io::config::GithubConfig;

const API_VERSION: &str = "2022-11-28";

/// Source of past workflow runs.
pub trait RunHistory {
    /// List runs matching `query`, newest first.
    fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>>;
}

/// Lists workflow runs through `GET /repos/{owner}/{repo}/actions/workflows/{workflow}/runs`.
pub struct GithubRunHistory {
    agent: ureq::Agent,
    api_url: String,
    token: Option<String>,
    per_page: u32,
    user_agent: String,
}

impl GithubRunHistory {
    pub fn new(config: &GithubConfig, token: Option<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.http_timeout_secs)))
            .build()
            .new_agent();
        Self {
            agent,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            per_page: config.per_page,
            user_agent: config.user_agent.clone(),
        }
    }

    fn runs_url(&self, query: &RunQuery) -> String {
        runs_url(&self.api_url, query)
    }
}

impl RunHistory for GithubRunHistory {
    #[instrument(
        skip_all,
        fields(owner = %query.owner, repo = %query.repo, workflow = %query.workflow)
    )]
    fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        let url = self.runs_url(query);
        debug!(%url, event = %query.event, status = %query.status, "listing workflow runs");
        let mut request = self
            .agent
            .get(&url)
            .query("event", &query.event)
            .query("status", &query.status)
            .query("per_page", self.per_page.to_string())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", &self.user_agent);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let mut response = request.call().with_context(|| format!("GET {url}"))?;
        let body = response
            .body_mut()
            .read_to_string()
            .context("read workflow runs response")?;
        let runs = parse_runs(&body)?;
        info!(count = runs.len(), "fetched successful workflow runs");
        Ok(runs)
    }
}

fn runs_url(api_url: &str, query: &RunQuery) -> String {
    format!(
        "{}/repos/{}/{}/actions/workflows/{}/runs",
        api_url.trim_end_matches('/'),
        query.owner,
        query.repo,
        query.workflow
    )
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsPage {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    head_sha: String,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<WorkflowRun> for RunRecord {
    fn from(run: WorkflowRun) -> Self {
        Self {
            id: run.id,
            name: run.name,
            head_sha: CommitId::new(run.head_sha),
            event: run.event,
            status: run.status,
            conclusion: run.conclusion,
            created_at: run.created_at,
        }
    }
}

/// Parse a workflow runs page, keeping the API's order.
pub fn parse_runs(body: &str) -> Result<Vec<RunRecord>> {
    let page: WorkflowRunsPage =
        serde_json::from_str(body).context("parse workflow runs response")?;
    Ok(page.workflow_runs.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> RunQuery {
        RunQuery {
            owner: "octo".to_string(),
            repo: "widgets".to_string(),
            workflow: "release.yml".to_string(),
            event: "push".to_string(),
            status: "success".to_string(),
        }
    }

    #[test]
    fn runs_url_joins_api_and_workflow() {
        assert_eq!(
            runs_url("https://api.github.com/", &query()),
            "https://api.github.com/repos/octo/widgets/actions/workflows/release.yml/runs"
        );
    }

    #[test]
    fn parse_runs_keeps_order_and_fields() {
        let body = r#"{
            "total_count": 2,
            "workflow_runs": [
                {
                    "id": 30,
                    "name": "Release",
                    "head_sha": "bbbb",
                    "event": "push",
                    "status": "completed",
                    "conclusion": "success",
                    "created_at": "2024-05-02T10:00:00Z",
                    "html_url": "https://github.com/octo/widgets/actions/runs/30"
                },
                {
                    "id": 20,
                    "head_sha": "aaaa",
                    "created_at": null
                }
            ]
        }"#;
        let runs = parse_runs(body).expect("parse");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, 30);
        assert_eq!(runs[0].head_sha.as_str(), "bbbb");
        assert_eq!(runs[0].conclusion.as_deref(), Some("success"));
        assert!(runs[0].created_at.is_some());
        assert_eq!(runs[1].head_sha.as_str(), "aaaa");
        assert!(runs[1].name.is_none());
        assert!(runs[1].created_at.is_none());
    }

    #[test]
    fn parse_runs_accepts_empty_page() {
        let runs = parse_runs(r#"{"total_count": 0, "workflow_runs": []}"#).expect("parse");
        assert!(runs.is_empty());
    }

    #[test]
    fn parse_runs_rejects_malformed_body() {
        let err = parse_runs("not json").expect_err("must fail");
        assert!(format!("{err:#}").contains("parse workflow runs response"));
    }
}
