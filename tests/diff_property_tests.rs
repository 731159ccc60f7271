//! Property-based tests for the diff engine: equal inputs produce no hunks,
//! and applying a hunk sequence to the old side reproduces the new side.

use driftrec::diff::{DiffHunk, HunkRange, diff, render_hunks};
use proptest::prelude::*;

/// Re-applies a hunk sequence: keep unchanged old lines, drop deleted
/// ranges, splice in added ranges.
fn apply<'a>(hunks: &[DiffHunk], old: &[&'a str], new: &[&'a str]) -> Vec<&'a str> {
    let mut rebuilt = Vec::new();
    let mut cursor = 0usize;
    for hunk in hunks {
        let (skip_from, skip_to) = match hunk.old {
            HunkRange::Lines { start, end } => (start - 1, end),
            HunkRange::Empty { anchor } => (anchor, anchor),
        };
        rebuilt.extend_from_slice(&old[cursor..skip_from]);
        cursor = skip_to;
        if let HunkRange::Lines { start, end } = hunk.new {
            rebuilt.extend_from_slice(&new[start - 1..end]);
        }
    }
    rebuilt.extend_from_slice(&old[cursor..]);
    rebuilt
}

fn line_vec() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-d]{0,3}", 0..12)
}

proptest! {
    #[test]
    fn equal_inputs_yield_zero_hunks(lines in line_vec()) {
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        prop_assert!(diff(&refs, &refs).is_empty());
    }

    #[test]
    fn round_trip_reproduces_new_lines(old in line_vec(), new in line_vec()) {
        let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
        let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();
        let hunks = diff(&old_refs, &new_refs);
        prop_assert_eq!(apply(&hunks, &old_refs, &new_refs), new_refs);
    }

    #[test]
    fn rendering_is_deterministic(old in line_vec(), new in line_vec()) {
        let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
        let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();
        let first = render_hunks(&diff(&old_refs, &new_refs), &old_refs, &new_refs);
        let second = render_hunks(&diff(&old_refs, &new_refs), &old_refs, &new_refs);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn hunk_ranges_stay_in_bounds(old in line_vec(), new in line_vec()) {
        let old_refs: Vec<&str> = old.iter().map(String::as_str).collect();
        let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();
        for hunk in diff(&old_refs, &new_refs) {
            if let HunkRange::Lines { start, end } = hunk.old {
                prop_assert!(start >= 1 && end <= old_refs.len() && start <= end);
            }
            if let HunkRange::Lines { start, end } = hunk.new {
                prop_assert!(start >= 1 && end <= new_refs.len() && start <= end);
            }
        }
    }
}
