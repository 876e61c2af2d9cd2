//! Base/head commit resolution for tag-triggered GitHub Actions runs.
//!
//! Given a run started by a tag push, the crate reports the current checkout
//! as the head commit and picks a base commit from, in order: an explicit
//! `base_tag` reference, the latest successful run of the same workflow whose
//! commit is itself a tag, or the repository's root commit.
//!
//! - **[`core`]**: Pure, deterministic logic (trigger guard, run ordering,
//!   tag scan). No I/O.
//! - **[`io`]**: Side-effecting adapters (git subprocess, GitHub REST, Actions
//!   environment, config). Collaborators sit behind traits so tests can script
//!   them.
//!
//! [`resolve`] runs the base priority chain and [`action`] drives one
//! invocation end to end.

pub mod action;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
