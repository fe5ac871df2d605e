//! Which keys to warm in response to user activity
//!
//! These are pure planning functions; [`ContentLibrary`](crate::ContentLibrary)
//! turns their output into background warm-ups.

use crate::caching::CacheKey;

/// Verbs to warm at startup: the working set minus the active selection
///
/// The active verb is already being fetched in the foreground. Verbs are
/// compared by cache key, and duplicates are dropped in first occurrence order.
pub fn startup_targets<'a>(working_set: &'a [String], active: Option<&str>) -> Vec<&'a str> {
    let active = active.map(CacheKey::for_verb);
    let mut seen: Vec<CacheKey> = Vec::with_capacity(working_set.len());
    let mut targets = Vec::with_capacity(working_set.len());
    for item in working_set {
        let key = CacheKey::for_verb(item);
        if active.as_ref() == Some(&key) || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        targets.push(item.as_str());
    }
    targets
}

/// The `lookahead` items following `selected` in `list`
///
/// An out-of-range selection yields nothing; the end of the list truncates.
pub fn lookahead_targets<T>(list: &[T], selected: usize, lookahead: usize) -> &[T] {
    if selected >= list.len() {
        return &[];
    }
    let start = selected + 1;
    let end = start.saturating_add(lookahead).min(list.len());
    &list[start..end]
}

/// Next item of a drill sequence, if any
pub fn drill_target<T>(sequence: &[T], index: usize) -> Option<&T> {
    sequence.get(index.checked_add(1)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead_after_selection() {
        let verbs = ["A", "B", "C", "D"];
        assert_eq!(lookahead_targets(&verbs, 0, 2), &["B", "C"]);
        assert_eq!(lookahead_targets(&verbs, 2, 2), &["D"]);
        assert!(lookahead_targets(&verbs, 3, 2).is_empty());
        assert!(lookahead_targets(&verbs, 9, 2).is_empty());
    }

    #[test]
    fn test_startup_skips_active_selection() {
        let working = vec!["ser".to_string(), "ter".to_string(), "ir".to_string()];
        assert_eq!(startup_targets(&working, Some("ter")), vec!["ser", "ir"]);
        assert_eq!(startup_targets(&working, Some(" Ter ")), vec!["ser", "ir"]);
        assert_eq!(startup_targets(&working, None), vec!["ser", "ter", "ir"]);
    }

    #[test]
    fn test_startup_drops_duplicates() {
        let working = vec!["ser".to_string(), "Ser".to_string(), "ir".to_string()];
        assert_eq!(startup_targets(&working, Some("falar")), vec!["ser", "ir"]);
    }

    #[test]
    fn test_drill_target() {
        let seq = ["um", "dois"];
        assert_eq!(drill_target(&seq, 0), Some(&"dois"));
        assert_eq!(drill_target(&seq, 1), None);
        assert_eq!(drill_target(&seq, usize::MAX), None);
    }
}
