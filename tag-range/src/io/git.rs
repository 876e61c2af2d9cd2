//! Git adapter for commit resolution.
//!
//! Every version-control query the resolver needs goes through a small,
//! explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, instrument};

use crate::core::types::CommitId;

/// Version-control queries used to resolve a commit range.
pub trait VersionControl {
    /// Resolve a reference (tag, branch, sha) to the commit it points at.
    fn resolve_ref(&self, reference: &str) -> Result<CommitId>;

    /// Commit at the current checkout position.
    fn head_commit(&self) -> Result<CommitId>;

    /// Parentless first commit reachable from HEAD, if any.
    fn root_commit(&self) -> Result<Option<CommitId>>;

    /// True if some tag points exactly at `commit`. Never fails: any query
    /// error counts as "not a tag".
    fn is_exact_tag_match(&self, commit: &CommitId) -> bool;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl VersionControl for Git {
    #[instrument(skip(self))]
    fn resolve_ref(&self, reference: &str) -> Result<CommitId> {
        if reference.starts_with('-') {
            bail!("refusing to resolve reference that looks like an option: '{reference}'");
        }
        let spec = format!("{reference}^{{commit}}");
        let out = self.run_capture(&["rev-parse", "--verify", &spec])?;
        let commit = CommitId::new(out);
        debug!(%commit, "resolved reference");
        Ok(commit)
    }

    fn head_commit(&self) -> Result<CommitId> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(CommitId::new(out))
    }

    /// Histories with several roots list them newest first; the last one is
    /// the oldest.
    fn root_commit(&self) -> Result<Option<CommitId>> {
        let out = self.run_capture(&["rev-list", "--max-parents=0", "HEAD"])?;
        Ok(parse_root_commit(&out))
    }

    fn is_exact_tag_match(&self, commit: &CommitId) -> bool {
        match self.run_checked(&["describe", "--tags", "--exact-match", commit.as_str()]) {
            Ok(output) => {
                let tag = String::from_utf8_lossy(&output.stdout);
                debug!(%commit, tag = %tag.trim(), "commit is a tag");
                true
            }
            Err(err) => {
                debug!(%commit, err = %err, "commit is not a tag");
                false
            }
        }
    }
}

fn parse_root_commit(rev_list: &str) -> Option<CommitId> {
    rev_list
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(CommitId::new)
}
