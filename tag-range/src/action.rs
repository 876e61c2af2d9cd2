//! Orchestration for one action invocation.
//!
//! Trigger guard → head capture → base priority chain → outputs. Head and base
//! are plain locals returned in [`ActionOutcome`]; nothing outlives the call.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::guard::{INELIGIBLE_MESSAGE, is_eligible};
use crate::core::types::{CommitId, OnBaseTagError, Resolution};
use crate::exit_codes;
use crate::io::actions::{ActionContext, OutputSink, read_event_payload};
use crate::io::git::VersionControl;
use crate::io::github::RunHistory;
use crate::resolve::{BaseResolver, NO_BASE_MESSAGE};

pub const HEAD_SHA_OUTPUT: &str = "head_sha";
pub const BASE_SHA_OUTPUT: &str = "base_sha";
pub const BASE_SOURCE_OUTPUT: &str = "base_source";

/// Terminal state of an invocation that did not hit an unexpected error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Trigger was not a tag; no outputs were set.
    Ineligible,
    /// `head_sha` was set but no base could be found.
    NoBase { head: CommitId },
    /// Both outputs were set.
    Resolved {
        head: CommitId,
        resolution: Resolution,
    },
}

impl ActionOutcome {
    /// Failure message to report, if the outcome is a failure.
    pub fn failure_message(&self) -> Option<&'static str> {
        match self {
            ActionOutcome::Ineligible => Some(INELIGIBLE_MESSAGE),
            ActionOutcome::NoBase { .. } => Some(NO_BASE_MESSAGE),
            ActionOutcome::Resolved { .. } => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ActionOutcome::Ineligible => exit_codes::NOT_TAG_TRIGGER,
            ActionOutcome::NoBase { .. } => exit_codes::NO_BASE,
            ActionOutcome::Resolved { .. } => exit_codes::OK,
        }
    }
}

/// Run the action end to end against the given collaborators.
///
/// `head_sha` is reported before base resolution starts, so it stays set when
/// the chain comes up empty or errors.
#[instrument(skip_all)]
pub fn run_action<V, H, O>(
    ctx: &ActionContext,
    vcs: &V,
    history: &H,
    outputs: &mut O,
    policy: OnBaseTagError,
) -> Result<ActionOutcome>
where
    V: VersionControl,
    H: RunHistory,
    O: OutputSink + ?Sized,
{
    info!("starting");
    log_event_payload(ctx);

    if !is_eligible(ctx.ref_type.as_deref()) {
        warn!(ref_type = ?ctx.ref_type, "run was not triggered by a tag");
        return Ok(ActionOutcome::Ineligible);
    }

    let head = vcs.head_commit().context("resolve HEAD")?;
    outputs.set_output(HEAD_SHA_OUTPUT, head.as_str())?;

    let query = ctx.run_query()?;
    let resolver = BaseResolver::new(vcs, history, policy);
    let Some(resolution) = resolver.resolve_base(ctx.explicit_base(), query.as_ref())? else {
        warn!(%head, "could not find a sha as the base sha");
        return Ok(ActionOutcome::NoBase { head });
    };

    outputs.set_output(BASE_SHA_OUTPUT, resolution.base.as_str())?;
    outputs.set_output(BASE_SOURCE_OUTPUT, resolution.source.as_str())?;

    info!(base = %resolution.base, source = %resolution.source, "base sha resolved");
    info!(%head, "head sha resolved");
    info!("finished");
    Ok(ActionOutcome::Resolved { head, resolution })
}

fn log_event_payload(ctx: &ActionContext) {
    let Some(path) = &ctx.event_path else {
        return;
    };
    match read_event_payload(path) {
        Ok(payload) => debug!(%payload, "event payload"),
        Err(err) => {
            let err = format!("{err:#}");
            warn!(err = %err, "could not read event payload");
        }
    }
}
