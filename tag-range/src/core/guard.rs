//! Trigger guard: only tag-triggered runs may resolve a range.

/// Trigger-type value reported by the hosting environment for tag pushes.
pub const TAG_REF_TYPE: &str = "tag";

/// Failure message reported when the run was not started by a tag.
pub const INELIGIBLE_MESSAGE: &str = "Only works for tag triggers";

/// True only when the trigger-type signal is exactly `"tag"`.
pub fn is_eligible(ref_type: Option<&str>) -> bool {
    ref_type == Some(TAG_REF_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_trigger_is_eligible() {
        assert!(is_eligible(Some("tag")));
    }

    #[test]
    fn other_triggers_are_not_eligible() {
        for ref_type in ["branch", "Tag", " tag", "", "tags"] {
            assert!(
                !is_eligible(Some(ref_type)),
                "{ref_type:?} must be rejected"
            );
        }
        assert!(!is_eligible(None));
    }
}
