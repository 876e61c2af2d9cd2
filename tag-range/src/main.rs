//! `tag-range`: report `head_sha` and `base_sha` for a tag-triggered run.
//!
//! Every flag falls back to the variable GitHub Actions sets for it, so inside
//! a workflow the binary runs without arguments.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use tag_range::action::{ActionOutcome, run_action};
use tag_range::core::types::OnBaseTagError;
use tag_range::exit_codes;
use tag_range::io::actions::{
    ActionContext, GithubOutputFile, OutputSink, StdoutOutputs, report_failure,
};
use tag_range::io::config::{ConfigOverrides, load_config};
use tag_range::io::git::Git;
use tag_range::io::github::GithubRunHistory;
use tag_range::logging;

const DEFAULT_CONFIG_PATH: &str = ".github/tag-range.toml";

#[derive(Parser, Debug)]
#[command(
    name = "tag-range",
    version,
    about = "Resolve base and head commits for a tag-triggered workflow run"
)]
struct Cli {
    /// Trigger type of the run; only `tag` is accepted.
    #[arg(long, env = "GITHUB_REF_TYPE")]
    ref_type: Option<String>,

    /// Explicit base reference (tag, branch or sha).
    #[arg(long, env = "INPUT_BASE_TAG")]
    base_tag: Option<String>,

    /// Repository as `owner/name`.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Workflow ref, path or file name. Falls back to `GITHUB_WORKFLOW`.
    #[arg(long, env = "GITHUB_WORKFLOW_REF")]
    workflow: Option<String>,

    #[arg(long, env = "GITHUB_WORKFLOW", hide = true)]
    workflow_name: Option<String>,

    /// Event kind that triggered the run (e.g. `push`).
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event_name: Option<String>,

    /// Webhook payload file, logged at debug level.
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// `fail` or `fallback` when `base_tag` does not resolve.
    #[arg(long, env = "INPUT_ON_BASE_TAG_ERROR")]
    on_base_tag_error: Option<String>,

    /// GitHub REST API root.
    #[arg(long, env = "GITHUB_API_URL")]
    api_url: Option<String>,

    /// API token for the run history lookup. Falls back to the `token` input.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, env = "INPUT_TOKEN", hide = true, hide_env_values = true)]
    input_token: Option<String>,

    /// File that receives `name=value` outputs. Printed to stdout when unset.
    #[arg(long, env = "GITHUB_OUTPUT")]
    output_file: Option<PathBuf>,

    /// TOML config file [default: <workdir>/.github/tag-range.toml].
    #[arg(long, env = "TAG_RANGE_CONFIG")]
    config: Option<PathBuf>,

    /// Repository checkout [default: current directory].
    #[arg(long, env = "GITHUB_WORKSPACE")]
    workdir: Option<PathBuf>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(outcome) => {
            if let Some(message) = outcome.failure_message() {
                report_failure(message);
            }
            outcome.exit_code()
        }
        Err(err) => {
            let message = format!("{err:#}");
            error!(err = %message, "run failed");
            report_failure(&message);
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<ActionOutcome> {
    let workdir = non_empty_path(cli.workdir).unwrap_or_else(|| PathBuf::from("."));
    let config_path =
        non_empty_path(cli.config).unwrap_or_else(|| workdir.join(DEFAULT_CONFIG_PATH));
    let overrides = ConfigOverrides {
        on_base_tag_error: parse_policy(cli.on_base_tag_error.as_deref())?,
        api_url: non_empty(cli.api_url),
    };
    let cfg = load_config(&config_path)?.apply_overrides(&overrides)?;

    let ctx = ActionContext {
        ref_type: cli.ref_type,
        base_tag: cli.base_tag,
        repository: cli.repository,
        workflow: first_non_empty(cli.workflow, cli.workflow_name),
        event_name: cli.event_name,
        event_path: non_empty_path(cli.event_path),
    };

    let git = Git::new(workdir);
    info!(
        workdir = %git.workdir().display(),
        policy = ?cfg.on_base_tag_error,
        "resolving commit range"
    );
    let token = first_non_empty(cli.token, cli.input_token);
    let history = GithubRunHistory::new(&cfg.github, token);
    let mut outputs: Box<dyn OutputSink> = match non_empty_path(cli.output_file) {
        Some(path) => Box::new(GithubOutputFile::new(path)),
        None => Box::new(StdoutOutputs),
    };

    run_action(
        &ctx,
        &git,
        &history,
        outputs.as_mut(),
        cfg.on_base_tag_error,
    )
}

/// Empty action inputs arrive as empty strings; treat them as unset.
fn parse_policy(raw: Option<&str>) -> Result<Option<OnBaseTagError>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => value
            .parse::<OnBaseTagError>()
            .map(Some)
            .map_err(anyhow::Error::msg),
        None => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_non_empty(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    non_empty(primary).or_else(|| non_empty(fallback))
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_explicit_flags() {
        let cli = Cli::parse_from([
            "tag-range",
            "--ref-type",
            "tag",
            "--base-tag",
            "v1.0.0",
            "--on-base-tag-error",
            "fallback",
            "--workdir",
            "/tmp/repo",
        ]);
        assert_eq!(cli.ref_type.as_deref(), Some("tag"));
        assert_eq!(cli.base_tag.as_deref(), Some("v1.0.0"));
        assert_eq!(cli.on_base_tag_error.as_deref(), Some("fallback"));
        assert_eq!(cli.workdir, Some(PathBuf::from("/tmp/repo")));
    }

    #[test]
    fn hidden_fallback_flags_parse() {
        let cli = Cli::parse_from([
            "tag-range",
            "--workflow-name",
            "Release",
            "--input-token",
            "from-input",
        ]);
        assert_eq!(cli.workflow_name.as_deref(), Some("Release"));
        assert_eq!(cli.input_token.as_deref(), Some("from-input"));
    }

    #[test]
    fn fallback_used_only_when_primary_is_blank() {
        let primary = || Some("primary".to_string());
        let fallback = || Some("fallback".to_string());
        assert_eq!(
            first_non_empty(primary(), fallback()).as_deref(),
            Some("primary")
        );
        assert_eq!(
            first_non_empty(Some(" ".to_string()), fallback()).as_deref(),
            Some("fallback")
        );
        assert_eq!(
            first_non_empty(None, fallback()).as_deref(),
            Some("fallback")
        );
        assert_eq!(first_non_empty(None, Some(String::new())), None);
    }

    #[test]
    fn policy_blank_is_unset() {
        assert_eq!(parse_policy(None).expect("parse"), None);
        assert_eq!(parse_policy(Some("  ")).expect("parse"), None);
        assert_eq!(
            parse_policy(Some("fallback")).expect("parse"),
            Some(OnBaseTagError::Fallback)
        );
    }

    #[test]
    fn policy_rejects_unknown_value() {
        let err = parse_policy(Some("retry")).expect_err("must fail");
        assert!(err.to_string().contains("invalid on_base_tag_error"));
    }
}
