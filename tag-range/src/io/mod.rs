//! Side-effecting adapters: git, GitHub REST, Actions environment, config.

pub mod actions;
pub mod config;
pub mod git;
pub mod github;
