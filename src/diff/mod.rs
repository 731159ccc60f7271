//! Line-based diff engine.
//!
//! [`engine::diff`] aligns two line sequences with a longest-common-
//! subsequence edit script and groups the changed regions into
//! [`DiffHunk`]s carrying 1-indexed line ranges. [`render`] turns hunks into
//! the unified-style text that ends up in commits and notifications.
//!
//! An empty hunk list means "no change" and short-circuits all downstream
//! commit and notify behavior.

pub mod engine;
pub mod render;

pub use engine::diff;
pub use render::{render_file_diff, render_hunks};

use std::fmt;

/// One side of a hunk: either a 1-indexed inclusive line range, or empty
/// with an anchor.
///
/// The anchor of an empty range is the line number after which the gap sits
/// (0 for a change before the first line), matching diff(1) numbering where
/// a pure insertion renders the old side as the bare anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkRange {
    /// No lines on this side.
    Empty {
        /// Line after which the gap sits, 1-indexed; 0 before the first line.
        anchor: usize,
    },
    /// A contiguous run of lines, 1-indexed and inclusive.
    Lines {
        /// First line of the run.
        start: usize,
        /// Last line of the run.
        end: usize,
    },
}

impl HunkRange {
    /// Builds a range from a 0-based start offset and a length.
    #[must_use]
    pub const fn from_span(start: usize, len: usize) -> Self {
        if len == 0 {
            Self::Empty { anchor: start }
        } else {
            Self::Lines {
                start: start + 1,
                end: start + len,
            }
        }
    }

    /// Whether this side of the hunk has no lines.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    /// Number of lines covered.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::Empty { .. } => 0,
            Self::Lines { start, end } => end - start + 1,
        }
    }
}

impl fmt::Display for HunkRange {
    /// Renders diff(1)-style: a single line collapses to one number, a run
    /// renders `start,end`, an empty side renders its bare anchor.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Empty { anchor } => write!(f, "{anchor}"),
            Self::Lines { start, end } if start == end => write!(f, "{start}"),
            Self::Lines { start, end } => write!(f, "{start},{end}"),
        }
    }
}

/// A contiguous change region between two line sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffHunk {
    /// Range on the old side; empty for a pure insertion.
    pub old: HunkRange,
    /// Range on the new side; empty for a pure deletion.
    pub new: HunkRange,
}

impl DiffHunk {
    /// Classification of this hunk, driven purely by which range is empty.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match (self.old.is_empty(), self.new.is_empty()) {
            (false, false) => ChangeKind::Changed,
            (false, true) => ChangeKind::Deleted,
            (true, _) => ChangeKind::Added,
        }
    }
}

/// Hunk classification used in log summaries. Rendering never branches on
/// it; the range contents alone govern output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Lines present only on the new side.
    Added,
    /// Lines present only on the old side.
    Deleted,
    /// Lines replaced.
    Changed,
}

impl ChangeKind {
    /// Single-letter tag carried over from classic ed-style diff summaries.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Deleted => 'a',
            Self::Added => 'd',
            Self::Changed => 'c',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_display_single_line() {
        assert_eq!(HunkRange::from_span(1, 1).to_string(), "2");
    }

    #[test]
    fn test_range_display_run() {
        assert_eq!(HunkRange::from_span(0, 3).to_string(), "1,3");
    }

    #[test]
    fn test_range_display_empty_anchor() {
        assert_eq!(HunkRange::from_span(4, 0).to_string(), "4");
        assert_eq!(HunkRange::from_span(0, 0).to_string(), "0");
    }

    #[test]
    fn test_kind_letters() {
        let deletion = DiffHunk {
            old: HunkRange::from_span(1, 2),
            new: HunkRange::from_span(1, 0),
        };
        let insertion = DiffHunk {
            old: HunkRange::from_span(1, 0),
            new: HunkRange::from_span(1, 2),
        };
        let change = DiffHunk {
            old: HunkRange::from_span(1, 1),
            new: HunkRange::from_span(1, 1),
        };
        assert_eq!(deletion.kind().letter(), 'a');
        assert_eq!(insertion.kind().letter(), 'd');
        assert_eq!(change.kind().letter(), 'c');
    }
}
