//! Stable exit codes for the `tag-range` binary.

/// Head and base were resolved and reported.
pub const OK: i32 = 0;
/// Unexpected error (git, network, configuration, output channel).
pub const ERROR: i32 = 1;
/// The run was not triggered by a tag.
pub const NOT_TAG_TRIGGER: i32 = 2;
/// Every step of the base priority chain came up empty.
pub const NO_BASE: i32 = 3;
