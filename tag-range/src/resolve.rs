//! Base commit priority chain.
//!
//! Steps, first satisfied wins:
//! 1. explicit `base_tag` reference
//! 2. latest successful run of this workflow whose commit is exactly a tag
//! 3. repository root commit
//!
//! When all three come up empty the caller reports "Could not find a base sha".

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::scan::{first_tagged, order_newest_first};
use crate::core::types::{BaseSource, CommitId, OnBaseTagError, Resolution, RunQuery};
use crate::io::git::VersionControl;
use crate::io::github::RunHistory;

/// Failure message reported when no step produced a base commit.
pub const NO_BASE_MESSAGE: &str = "Could not find a base sha";

/// Resolves the base commit against a version-control and a run-history
/// collaborator.
///
/// # Explicit base errors
///
/// `policy` decides what happens when `base_tag` is given but does not
/// resolve: [`OnBaseTagError::Fail`] (default) propagates the git error,
/// [`OnBaseTagError::Fallback`] logs a warning and continues with step 2.
pub struct BaseResolver<'a, V, H> {
    vcs: &'a V,
    history: &'a H,
    policy: OnBaseTagError,
}

impl<'a, V: VersionControl, H: RunHistory> BaseResolver<'a, V, H> {
    pub fn new(vcs: &'a V, history: &'a H, policy: OnBaseTagError) -> Self {
        Self {
            vcs,
            history,
            policy,
        }
    }

    /// Run the priority chain.
    ///
    /// `query` is `None` when the run-history context is unavailable, in which
    /// case step 2 is skipped. Returns `Ok(None)` when every step came up empty.
    #[instrument(skip_all, fields(explicit = explicit_base.is_some()))]
    pub fn resolve_base(
        &self,
        explicit_base: Option<&str>,
        query: Option<&RunQuery>,
    ) -> Result<Option<Resolution>> {
        if let Some(reference) = explicit_base {
            info!(reference, "setting the base sha from the base_tag input");
            match self.vcs.resolve_ref(reference) {
                Ok(base) => {
                    return Ok(Some(Resolution {
                        base,
                        source: BaseSource::Explicit,
                    }));
                }
                Err(err) => match self.policy {
                    OnBaseTagError::Fail => {
                        return Err(err.context(format!("resolve base_tag '{reference}'")));
                    }
                    OnBaseTagError::Fallback => {
                        let err = format!("{err:#}");
                        warn!(reference, err = %err, "base_tag did not resolve, falling back");
                    }
                },
            }
        }

        match query {
            Some(query) => {
                info!("setting the base sha from the latest successful workflow run");
                if let Some(base) = self.latest_tagged_run(query)? {
                    return Ok(Some(Resolution {
                        base,
                        source: BaseSource::LatestTaggedRun,
                    }));
                }
            }
            None => {
                warn!("repository, workflow or event name unknown; skipping run history lookup");
            }
        }

        info!("setting the base sha from the root commit");
        let root = self.vcs.root_commit().context("look up root commit")?;
        Ok(root.map(|base| Resolution {
            base,
            source: BaseSource::RootCommit,
        }))
    }

    /// Commit of the newest successful run that is exactly a tag.
    ///
    /// Listing errors propagate; tag-test errors count as "not a tag".
    pub fn latest_tagged_run(&self, query: &RunQuery) -> Result<Option<CommitId>> {
        let mut runs = self
            .history
            .list_runs(query)
            .context("list successful workflow runs")?;
        if !order_newest_first(&mut runs) {
            debug!("run timestamps incomplete, keeping run history order");
        }
        let found = first_tagged(&runs, |sha| self.vcs.is_exact_tag_match(sha));
        match found {
            Some(run) => {
                debug!(%run, "latest successful run points at a tag");
                Ok(Some(run.head_sha.clone()))
            }
            None => {
                debug!(scanned = runs.len(), "no successful run points at a tag");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeVcs, ScriptedHistory, run_query, run_record, run_record_at};

    #[test]
    fn explicit_base_wins_regardless_of_history() {
        let vcs = FakeVcs::new("head")
            .with_ref("v1.0.0", "explicit")
            .with_root("root")
            .with_tags(&["tagged"]);
        let history = ScriptedHistory::new(vec![run_record(1, "tagged")]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let resolution = resolver
            .resolve_base(Some("v1.0.0"), Some(&run_query()))
            .expect("resolve")
            .expect("base");

        assert_eq!(resolution.base.as_str(), "explicit");
        assert_eq!(resolution.source, BaseSource::Explicit);
        assert!(history.queries().is_empty(), "history must not be queried");
    }

    #[test]
    fn unresolvable_explicit_base_fails_by_default() {
        let vcs = FakeVcs::new("head").with_root("root");
        let history = ScriptedHistory::new(Vec::new());
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let err = resolver
            .resolve_base(Some("v9.9.9"), Some(&run_query()))
            .expect_err("must fail");

        assert!(format!("{err:#}").contains("resolve base_tag 'v9.9.9'"));
        assert!(history.queries().is_empty());
    }

    #[test]
    fn unresolvable_explicit_base_falls_back_when_configured() {
        let vcs = FakeVcs::new("head")
            .with_root("root")
            .with_tags(&["tagged"]);
        let history = ScriptedHistory::new(vec![run_record(1, "tagged")]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fallback);

        let resolution = resolver
            .resolve_base(Some("v9.9.9"), Some(&run_query()))
            .expect("resolve")
            .expect("base");

        assert_eq!(resolution.base.as_str(), "tagged");
        assert_eq!(resolution.source, BaseSource::LatestTaggedRun);
    }

    #[test]
    fn first_tagged_run_is_chosen_over_later_ones() {
        let vcs = FakeVcs::new("head")
            .with_root("root")
            .with_tags(&["newer-tag", "older-tag"]);
        let history =
            ScriptedHistory::new(vec![run_record(3, "newer-tag"), run_record(2, "older-tag")]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let resolution = resolver
            .resolve_base(None, Some(&run_query()))
            .expect("resolve")
            .expect("base");

        assert_eq!(resolution.base.as_str(), "newer-tag");
        assert_eq!(vcs.tag_checks(), vec!["newer-tag"]);
        assert_eq!(history.queries(), vec![run_query()]);
    }

    #[test]
    fn untagged_runs_are_skipped() {
        let vcs = FakeVcs::new("head")
            .with_root("root")
            .with_tags(&["tagged"]);
        let history =
            ScriptedHistory::new(vec![run_record(3, "branch-commit"), run_record(2, "tagged")]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let resolution = resolver
            .resolve_base(None, Some(&run_query()))
            .expect("resolve")
            .expect("base");

        assert_eq!(resolution.base.as_str(), "tagged");
        assert_eq!(vcs.tag_checks(), vec!["branch-commit", "tagged"]);
    }

    #[test]
    fn out_of_order_history_is_scanned_newest_first() {
        let vcs = FakeVcs::new("head")
            .with_root("root")
            .with_tags(&["old", "new"]);
        let history = ScriptedHistory::new(vec![
            run_record_at(1, "old", "2024-01-01T00:00:00Z"),
            run_record_at(2, "new", "2024-06-01T00:00:00Z"),
        ]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let base = resolver
            .latest_tagged_run(&run_query())
            .expect("scan")
            .expect("base");

        assert_eq!(base.as_str(), "new");
    }

    #[test]
    fn no_tagged_run_falls_back_to_root() {
        let vcs = FakeVcs::new("head").with_root("root");
        let history = ScriptedHistory::new(vec![run_record(1, "a"), run_record(2, "b")]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let resolution = resolver
            .resolve_base(None, Some(&run_query()))
            .expect("resolve")
            .expect("base");

        assert_eq!(resolution.base.as_str(), "root");
        assert_eq!(resolution.source, BaseSource::RootCommit);
    }

    #[test]
    fn empty_history_falls_back_to_root() {
        let vcs = FakeVcs::new("head").with_root("root");
        let history = ScriptedHistory::new(Vec::new());
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let resolution = resolver
            .resolve_base(None, Some(&run_query()))
            .expect("resolve")
            .expect("base");

        assert_eq!(resolution.base.as_str(), "root");
        assert!(vcs.tag_checks().is_empty());
    }

    #[test]
    fn missing_query_skips_history() {
        let vcs = FakeVcs::new("head").with_root("root");
        let history = ScriptedHistory::new(vec![run_record(1, "tagged")]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let resolution = resolver
            .resolve_base(None, None)
            .expect("resolve")
            .expect("base");

        assert_eq!(resolution.source, BaseSource::RootCommit);
        assert!(history.queries().is_empty());
    }

    #[test]
    fn exhausted_chain_yields_none() {
        let vcs = FakeVcs::new("head");
        let history = ScriptedHistory::new(vec![run_record(1, "a")]);
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let resolution = resolver
            .resolve_base(None, Some(&run_query()))
            .expect("resolve");

        assert!(resolution.is_none());
    }

    #[test]
    fn history_error_propagates() {
        let vcs = FakeVcs::new("head").with_root("root");
        let history = ScriptedHistory::failing("HTTP 404 Not Found");
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let err = resolver
            .resolve_base(None, Some(&run_query()))
            .expect_err("must fail");

        let rendered = format!("{err:#}");
        assert!(rendered.contains("list successful workflow runs"));
        assert!(rendered.contains("HTTP 404 Not Found"));
    }

    #[test]
    fn root_lookup_error_propagates() {
        let vcs = FakeVcs::new("head").with_root_error("not a git repository");
        let history = ScriptedHistory::new(Vec::new());
        let resolver = BaseResolver::new(&vcs, &history, OnBaseTagError::Fail);

        let err = resolver.resolve_base(None, None).expect_err("must fail");

        assert!(format!("{err:#}").contains("look up root commit"));
    }
}
