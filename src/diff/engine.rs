//! Hunk computation over a longest-common-subsequence edit script.

use super::{DiffHunk, HunkRange};
use similar::{Algorithm, DiffTag, capture_diff_slices};
use tracing::debug;

/// Computes the change regions between two line sequences.
///
/// The edit script comes from a Myers LCS alignment; maximal runs of
/// non-equal edit operations form one hunk each. Ranges are 1-indexed per
/// [`HunkRange`]. Identical inputs always produce an identical hunk
/// sequence, and equal sequences produce no hunks at all.
#[must_use]
pub fn diff(old_lines: &[&str], new_lines: &[&str]) -> Vec<DiffHunk> {
    let ops = capture_diff_slices(Algorithm::Myers, old_lines, new_lines);

    let mut hunks = Vec::new();
    // (old_start, old_end, new_start, new_end), 0-based half-open spans
    let mut pending: Option<(usize, usize, usize, usize)> = None;

    for op in &ops {
        if op.tag() == DiffTag::Equal {
            if let Some(span) = pending.take() {
                hunks.push(hunk_from_span(span));
            }
            continue;
        }
        let old = op.old_range();
        let new = op.new_range();
        match pending.as_mut() {
            Some((_, old_end, _, new_end)) => {
                *old_end = old.end;
                *new_end = new.end;
            }
            None => pending = Some((old.start, old.end, new.start, new.end)),
        }
    }
    if let Some(span) = pending {
        hunks.push(hunk_from_span(span));
    }

    if !hunks.is_empty() {
        debug!(
            hunks = hunks.len(),
            summary = %hunks
                .iter()
                .map(|h| h.kind().letter().to_string())
                .collect::<String>(),
            "computed diff"
        );
    }
    hunks
}

const fn hunk_from_span(span: (usize, usize, usize, usize)) -> DiffHunk {
    let (old_start, old_end, new_start, new_end) = span;
    DiffHunk {
        old: HunkRange::from_span(old_start, old_end - old_start),
        new: HunkRange::from_span(new_start, new_end - new_start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    #[test]
    fn test_equal_inputs_yield_no_hunks() {
        let old = lines("line1\nline2\nline3");
        assert!(diff(&old, &old).is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff(&[], &[]).is_empty());
    }

    #[test]
    fn test_single_line_change() {
        let old = lines("line1\nline2");
        let new = lines("line1\nlineX");
        let hunks = diff(&old, &new);
        assert_eq!(
            hunks,
            vec![DiffHunk {
                old: HunkRange::Lines { start: 2, end: 2 },
                new: HunkRange::Lines { start: 2, end: 2 },
            }]
        );
    }

    #[test]
    fn test_pure_addition_from_empty() {
        let new = lines("a\nb");
        let hunks = diff(&[], &new);
        assert_eq!(
            hunks,
            vec![DiffHunk {
                old: HunkRange::Empty { anchor: 0 },
                new: HunkRange::Lines { start: 1, end: 2 },
            }]
        );
    }

    #[test]
    fn test_pure_deletion_in_middle() {
        let old = lines("a\nb\nc");
        let new = lines("a\nc");
        let hunks = diff(&old, &new);
        assert_eq!(
            hunks,
            vec![DiffHunk {
                old: HunkRange::Lines { start: 2, end: 2 },
                new: HunkRange::Empty { anchor: 1 },
            }]
        );
    }

    #[test]
    fn test_two_separate_hunks() {
        let old = lines("a\nb\nc\nd\ne");
        let new = lines("a\nB\nc\nd\nE");
        let hunks = diff(&old, &new);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].old, HunkRange::Lines { start: 2, end: 2 });
        assert_eq!(hunks[1].old, HunkRange::Lines { start: 5, end: 5 });
    }

    #[test]
    fn test_adjacent_delete_insert_merge_into_one_hunk() {
        let old = lines("a\nx\ny\nb");
        let new = lines("a\nz\nb");
        let hunks = diff(&old, &new);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old, HunkRange::Lines { start: 2, end: 3 });
        assert_eq!(hunks[0].new, HunkRange::Lines { start: 2, end: 2 });
    }

    #[test]
    fn test_determinism() {
        let old = lines("a\nb\nc\nd");
        let new = lines("a\nc\nb\nd");
        assert_eq!(diff(&old, &new), diff(&old, &new));
    }
}
