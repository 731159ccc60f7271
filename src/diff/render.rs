//! Text rendering of diff hunks.
//!
//! Output format: hunk header `@@ -<oldRange> +<newRange> @@`, removed lines
//! prefixed `- `, added lines prefixed `+ `, and one blank line after mixed
//! hunks to separate them from trailing context.

use super::{DiffHunk, HunkRange, engine};
use content_inspector::{ContentType, inspect};
use std::fmt::Write as _;
use std::path::Path;

/// Renders a hunk sequence against the line slices it was computed from.
///
/// Identical hunk sequences over identical lines always render identical
/// text; an empty hunk list renders to an empty string.
#[must_use]
pub fn render_hunks(hunks: &[DiffHunk], old_lines: &[&str], new_lines: &[&str]) -> String {
    let mut out = String::new();
    for hunk in hunks {
        let _ = writeln!(out, "@@ -{} +{} @@", hunk.old, hunk.new);
        if let HunkRange::Lines { start, end } = hunk.old {
            for line in &old_lines[start - 1..end] {
                let _ = writeln!(out, "- {line}");
            }
        }
        if let HunkRange::Lines { start, end } = hunk.new {
            for line in &new_lines[start - 1..end] {
                let _ = writeln!(out, "+ {line}");
            }
            if !hunk.old.is_empty() {
                out.push('\n');
            }
        }
    }
    out
}

/// Diffs two file contents and renders the result under a per-file header.
///
/// Returns an empty string when the contents are line-identical. Contents
/// that are not valid UTF-8 text are reported with a single
/// `Binary file … differs` line instead of hunks.
#[must_use]
pub fn render_file_diff(path: &Path, old: &[u8], new: &[u8]) -> String {
    if old == new {
        return String::new();
    }
    let (Some(old_text), Some(new_text)) = (as_text(old), as_text(new)) else {
        return format!("Binary file {} differs\n", path.display());
    };

    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();
    let hunks = engine::diff(&old_lines, &new_lines);
    if hunks.is_empty() {
        return String::new();
    }

    let mut out = format!("--- {} ---\n", path.display());
    out.push_str(&render_hunks(&hunks, &old_lines, &new_lines));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn as_text(bytes: &[u8]) -> Option<&str> {
    if bytes.is_empty() {
        return Some("");
    }
    if inspect(bytes) == ContentType::BINARY {
        return None;
    }
    simdutf8::basic::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lines(s: &str) -> Vec<&str> {
        s.lines().collect()
    }

    #[test]
    fn test_render_change_hunk() {
        let old = lines("line1\nline2");
        let new = lines("line1\nlineX");
        let hunks = engine::diff(&old, &new);
        let text = render_hunks(&hunks, &old, &new);
        assert_eq!(text, "@@ -2 +2 @@\n- line2\n+ lineX\n\n");
    }

    #[test]
    fn test_render_pure_addition() {
        let old: Vec<&str> = Vec::new();
        let new = lines("a\nb");
        let hunks = engine::diff(&old, &new);
        let text = render_hunks(&hunks, &old, &new);
        // Pure additions get no trailing blank line.
        assert_eq!(text, "@@ -0 +1,2 @@\n+ a\n+ b\n");
    }

    #[test]
    fn test_render_pure_deletion() {
        let old = lines("a\nb\nc");
        let new = lines("a\nc");
        let hunks = engine::diff(&old, &new);
        let text = render_hunks(&hunks, &old, &new);
        assert_eq!(text, "@@ -2 +1 @@\n- b\n");
    }

    #[test]
    fn test_render_is_deterministic() {
        let old = lines("one\ntwo\nthree");
        let new = lines("one\n2\nthree");
        let hunks = engine::diff(&old, &new);
        let first = render_hunks(&hunks, &old, &new);
        let second = render_hunks(&engine::diff(&old, &new), &old, &new);
        assert_eq!(first, second);
    }

    #[test]
    fn test_file_diff_identical_contents() {
        let path = PathBuf::from("etc/hosts");
        assert_eq!(render_file_diff(&path, b"same\n", b"same\n"), "");
    }

    #[test]
    fn test_file_diff_header_and_markers() {
        let path = PathBuf::from("etc/hosts");
        let text = render_file_diff(&path, b"line1\nline2\n", b"line1\nlineX\n");
        assert!(text.starts_with("--- etc/hosts ---\n"));
        assert!(text.contains("@@ -2 +2 @@"));
        assert!(text.contains("- line2"));
        assert!(text.contains("+ lineX"));
    }

    #[test]
    fn test_file_diff_binary_contents() {
        let path = PathBuf::from("bin/tool");
        let text = render_file_diff(&path, &[0u8, 159, 146, 150], b"text\n");
        assert_eq!(text, "Binary file bin/tool differs\n");
    }

    #[test]
    fn test_round_trip_reproduces_new_lines() {
        let old = lines("a\nb\nc\nd\ne");
        let new = lines("a\nx\nc\ne\nf");
        let hunks = engine::diff(&old, &new);

        // Re-applying the additions and removing the deletions from the old
        // side must reproduce the new side.
        let mut rebuilt: Vec<&str> = Vec::new();
        let mut old_cursor = 0usize; // 0-based index into old
        for hunk in &hunks {
            let (skip_from, skip_to) = match hunk.old {
                HunkRange::Lines { start, end } => (start - 1, end),
                HunkRange::Empty { anchor } => (anchor, anchor),
            };
            rebuilt.extend_from_slice(&old[old_cursor..skip_from]);
            old_cursor = skip_to;
            if let HunkRange::Lines { start, end } = hunk.new {
                rebuilt.extend_from_slice(&new[start - 1..end]);
            }
        }
        rebuilt.extend_from_slice(&old[old_cursor..]);
        assert_eq!(rebuilt, new);
    }
}
