//! Ordering and scanning of past run records.
//!
//! "Latest" is defined by list order: the scan visits records front to back
//! and stops at the first commit that passes the tag test.

use std::collections::HashSet;

use crate::core::types::{CommitId, RunRecord};

/// Put records in newest-first order.
///
/// The sort is stable and only applied when every record carries a
/// `created_at` timestamp; otherwise the collaborator order is kept. Returns
/// whether a sort was applied.
pub fn order_newest_first(records: &mut [RunRecord]) -> bool {
    if records.iter().any(|record| record.created_at.is_none()) {
        return false;
    }
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    true
}

/// Return the first record whose commit passes `is_tag`.
///
/// A commit that already failed the test is not checked again.
pub fn first_tagged<F>(records: &[RunRecord], mut is_tag: F) -> Option<&RunRecord>
where
    F: FnMut(&CommitId) -> bool,
{
    let mut rejected: HashSet<&CommitId> = HashSet::new();
    for record in records {
        if rejected.contains(&record.head_sha) {
            continue;
        }
        if is_tag(&record.head_sha) {
            return Some(record);
        }
        rejected.insert(&record.head_sha);
    }
    None
}
