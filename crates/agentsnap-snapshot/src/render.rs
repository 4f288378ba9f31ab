//! Git-style unified diff rendering.
//!
//! Two modes:
//! - metadata mode works from stored hashes alone and prints placeholder
//!   hunks for modified files;
//! - content mode reads both versions of each modified file and prints real
//!   line hunks, or `Binary files ... differ` when either side is not text.
//!
//! Added and removed files are reported with a header and their size in both
//! modes; there is no line-level body for them.
//!
//! Line matching is a single greedy pass: at each mismatch the nearest point
//! where both sides agree again is chosen. This is exact for ordinary
//! insert/delete/replace edits. Moved blocks show up as a delete plus an
//! insert rather than a minimal edit.
//!
//! The search for a resynchronisation point is bounded by
//! `MAX_RESYNC_DISTANCE` lines. An insertion or deletion longer than that
//! is not recognised, and the rest of the file becomes one delete+insert
//! block.

use crate::content::ContentSource;
use crate::diff::SnapshotDiff;
use crate::snapshot::{FileRecord, Snapshot};
use crate::{SnapshotError, SnapshotResult};
use bytesize::ByteSize;
use std::fmt::{self, Write as _};

/// Unchanged lines shown on each side of a change.
pub const CONTEXT_LINES: usize = 3;

/// How far ahead the matcher looks for a resynchronisation point.
const MAX_RESYNC_DISTANCE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Delete,
    Insert,
}

impl LineKind {
    fn marker(self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Delete => '-',
            LineKind::Insert => '+',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    pub kind: LineKind,
    /// Line text, including its terminator when the source had one.
    pub text: String,
}

/// One `@@ -a,b +c,d @@` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.lines {
            match line.text.strip_suffix('\n') {
                Some(body) => writeln!(f, "{}{}", line.kind.marker(), body)?,
                None => {
                    writeln!(f, "{}{}", line.kind.marker(), line.text)?;
                    writeln!(f, "\\ No newline at end of file")?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Equal,
    Delete,
    Insert,
}

/// One step of the edit script with the positions on both sides at which it
/// applies.
#[derive(Debug, Clone, Copy)]
struct Op {
    kind: OpKind,
    old: usize,
    new: usize,
}

fn edit_script(old: &[&str], new: &[&str]) -> Vec<Op> {
    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            ops.push(Op { kind: OpKind::Equal, old: i, new: j });
            i += 1;
            j += 1;
            continue;
        }
        let Some((next_i, next_j)) = resync(old, new, i, j) else {
            break;
        };
        ops.extend((i..next_i).map(|k| Op { kind: OpKind::Delete, old: k, new: j }));
        ops.extend((j..next_j).map(|k| Op { kind: OpKind::Insert, old: next_i, new: k }));
        i = next_i;
        j = next_j;
    }

    ops.extend((i..old.len()).map(|k| Op { kind: OpKind::Delete, old: k, new: j }));
    let end_old = old.len();
    ops.extend((j..new.len()).map(|k| Op { kind: OpKind::Insert, old: end_old, new: k }));
    ops
}

/// Nearest `(i', j')` with `old[i'] == new[j']`, minimising the lines skipped
/// on both sides; ties prefer skipping old lines.
fn resync(old: &[&str], new: &[&str], i: usize, j: usize) -> Option<(usize, usize)> {
    let remaining = (old.len() - i) + (new.len() - j);
    let limit = remaining.min(MAX_RESYNC_DISTANCE);
    for distance in 1..=limit {
        for skip_old in (0..=distance).rev() {
            let (oi, nj) = (i + skip_old, j + distance - skip_old);
            if oi < old.len() && nj < new.len() && old[oi] == new[nj] {
                return Some((oi, nj));
            }
        }
    }
    None
}

/// Group an edit script into hunks with `context` lines around each change.
/// Changes separated by at most `2 * context` unchanged lines share a hunk.
pub fn compute_hunks(old: &[&str], new: &[&str], context: usize) -> Vec<Hunk> {
    let ops = edit_script(old, new);
    let is_change = |k: usize| ops[k].kind != OpKind::Equal;
    let mut hunks = Vec::new();
    let mut cursor = 0;

    while let Some(first) = (cursor..ops.len()).find(|&k| is_change(k)) {
        let mut last = first;
        while let Some(next) = (last + 1..ops.len()).find(|&k| is_change(k)) {
            if next - last - 1 > 2 * context {
                break;
            }
            last = next;
        }

        let start = first.saturating_sub(context).max(cursor);
        let end = (last + 1 + context).min(ops.len());
        hunks.push(build_hunk(&ops[start..end], old, new));
        cursor = end;
    }

    hunks
}

fn build_hunk(ops: &[Op], old: &[&str], new: &[&str]) -> Hunk {
    let mut lines = Vec::with_capacity(ops.len());
    let (mut old_count, mut new_count) = (0, 0);

    for op in ops {
        let (kind, text) = match op.kind {
            OpKind::Equal => {
                old_count += 1;
                new_count += 1;
                (LineKind::Context, old[op.old])
            }
            OpKind::Delete => {
                old_count += 1;
                (LineKind::Delete, old[op.old])
            }
            OpKind::Insert => {
                new_count += 1;
                (LineKind::Insert, new[op.new])
            }
        };
        lines.push(HunkLine {
            kind,
            text: text.to_string(),
        });
    }

    // An empty side starts at the line before the hunk, as git does.
    let first = ops[0];
    let start = |index: usize, count: usize| if count == 0 { index } else { index + 1 };

    Hunk {
        old_start: start(first.old, old_count),
        old_count,
        new_start: start(first.new, new_count),
        new_count,
        lines,
    }
}

/// Split `text` into lines that keep their `\n` terminators.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Hunks between two texts with the default context.
pub fn diff_text(old: &str, new: &str) -> Vec<Hunk> {
    compute_hunks(&split_lines(old), &split_lines(new), CONTEXT_LINES)
}

/// Text is anything valid UTF-8 without NUL bytes.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0) || std::str::from_utf8(bytes).is_err()
}

fn size_label(record: Option<&FileRecord>) -> String {
    record
        .map(|r| ByteSize::b(r.size).to_string())
        .unwrap_or_else(|| "unknown size".to_string())
}

fn write_added(out: &mut String, path: &str, record: Option<&FileRecord>) {
    let _ = writeln!(out, "diff --git a/{path} b/{path}");
    let _ = writeln!(out, "new file ({})", size_label(record));
    let _ = writeln!(out, "--- /dev/null");
    let _ = writeln!(out, "+++ b/{path}");
}

fn write_removed(out: &mut String, path: &str, record: Option<&FileRecord>) {
    let _ = writeln!(out, "diff --git a/{path} b/{path}");
    let _ = writeln!(out, "deleted file ({})", size_label(record));
    let _ = writeln!(out, "--- a/{path}");
    let _ = writeln!(out, "+++ /dev/null");
}

fn write_modified_header(out: &mut String, path: &str) {
    let _ = writeln!(out, "diff --git a/{path} b/{path}");
    let _ = writeln!(out, "--- a/{path}");
    let _ = writeln!(out, "+++ b/{path}");
}

fn write_added_and_removed(out: &mut String, diff: &SnapshotDiff, from: &Snapshot, to: &Snapshot) {
    for path in &diff.added {
        write_added(out, path, to.get(path));
    }
    for path in &diff.removed {
        write_removed(out, path, from.get(path));
    }
}

/// Patch built from stored metadata only. Modified files get a placeholder
/// hunk listing old and new hash and size; it is not a content diff.
pub fn render_unified_metadata(diff: &SnapshotDiff, from: &Snapshot, to: &Snapshot) -> String {
    let mut out = String::new();
    write_added_and_removed(&mut out, diff, from, to);

    for path in &diff.modified {
        write_modified_header(&mut out, path);
        let old = from.get(path);
        let new = to.get(path);
        let describe = |r: Option<&FileRecord>| match r {
            Some(r) => (format!("hash {}\n", r.content_hash), format!("size {}\n", r.size)),
            None => ("hash unknown\n".to_string(), "size unknown\n".to_string()),
        };
        let (old_hash, old_size) = describe(old);
        let (new_hash, new_size) = describe(new);
        let hunk = Hunk {
            old_start: 1,
            old_count: 2,
            new_start: 1,
            new_count: 2,
            lines: vec![
                HunkLine { kind: LineKind::Delete, text: old_hash },
                HunkLine { kind: LineKind::Delete, text: old_size },
                HunkLine { kind: LineKind::Insert, text: new_hash },
                HunkLine { kind: LineKind::Insert, text: new_size },
            ],
        };
        let _ = write!(out, "{hunk}");
    }

    out
}

/// Patch with real line hunks for modified files.
///
/// `from_content` and `to_content` resolve snapshot paths to the bytes of the
/// respective side. A read failure aborts rendering with the offending path.
pub fn render_unified_content(
    diff: &SnapshotDiff,
    from_content: &dyn ContentSource,
    to_content: &dyn ContentSource,
    from: &Snapshot,
    to: &Snapshot,
) -> SnapshotResult<String> {
    let mut out = String::new();
    write_added_and_removed(&mut out, diff, from, to);

    for path in &diff.modified {
        let old_bytes = read_side(from_content, path)?;
        let new_bytes = read_side(to_content, path)?;

        if is_binary(&old_bytes) || is_binary(&new_bytes) {
            let _ = writeln!(out, "diff --git a/{path} b/{path}");
            let _ = writeln!(out, "Binary files a/{path} and b/{path} differ");
            continue;
        }

        // Both sides were validated as UTF-8 by `is_binary`.
        let old_text = String::from_utf8_lossy(&old_bytes);
        let new_text = String::from_utf8_lossy(&new_bytes);

        write_modified_header(&mut out, path);
        for hunk in diff_text(&old_text, &new_text) {
            let _ = write!(out, "{hunk}");
        }
    }

    Ok(out)
}

fn read_side(content: &dyn ContentSource, path: &str) -> SnapshotResult<Vec<u8>> {
    content.read(path).map_err(|e| {
        let location = content.locate(path).unwrap_or_else(|| path.into());
        SnapshotError::unreadable(location, e)
    })
}

/// One line per changed path (`A`, `D`, `M`) followed by totals.
pub fn render_summary(diff: &SnapshotDiff) -> String {
    let mut out = String::new();
    for path in &diff.added {
        let _ = writeln!(out, "A  {path}");
    }
    for path in &diff.removed {
        let _ = writeln!(out, "D  {path}");
    }
    for path in &diff.modified {
        let _ = writeln!(out, "M  {path}");
    }
    let _ = writeln!(
        out,
        "{} added, {} removed, {} modified",
        diff.added.len(),
        diff.removed.len(),
        diff.modified.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::DirContent;
    use crate::diff::diff;
    use crate::hash::hash_bytes;
    use agentsnap_test_utils::content::{numbered_lines, numbered_lines_with};
    use chrono::{TimeZone, Utc};

    fn snap(secs: u32, files: &[(&str, &str)]) -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap();
        Snapshot::new(
            ts,
            None,
            files.iter().map(|(path, text)| FileRecord {
                path: path.to_string(),
                content_hash: hash_bytes(text.as_bytes()),
                size: text.len() as u64,
                modified_at: ts,
            }),
        )
    }

    fn write_tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, text) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, text).unwrap();
        }
        dir
    }

    fn counts_match(hunk: &Hunk) -> bool {
        let old = hunk.lines.iter().filter(|l| l.kind != LineKind::Insert).count();
        let new = hunk.lines.iter().filter(|l| l.kind != LineKind::Delete).count();
        old == hunk.old_count && new == hunk.new_count
    }

    #[test]
    fn test_single_line_change_in_middle() {
        let old = numbered_lines(100);
        let new = numbered_lines_with(100, &[(50, "line fifty")]);
        let hunks = diff_text(&old, &new);

        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!(hunk.header(), "@@ -47,7 +47,7 @@");
        assert!(counts_match(hunk));

        let rendered = hunk.to_string();
        let expected = "@@ -47,7 +47,7 @@\n line 47\n line 48\n line 49\n-line 50\n+line fifty\n line 51\n line 52\n line 53\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_distant_changes_make_separate_hunks() {
        let old = numbered_lines(40);
        let new = numbered_lines_with(40, &[(5, "five"), (30, "thirty")]);
        let hunks = diff_text(&old, &new);

        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].header(), "@@ -2,7 +2,7 @@");
        assert_eq!(hunks[1].header(), "@@ -27,7 +27,7 @@");
        assert!(hunks.iter().all(counts_match));
    }

    #[test]
    fn test_close_changes_share_a_hunk() {
        let old = numbered_lines(30);
        let new = numbered_lines_with(30, &[(10, "ten"), (16, "sixteen")]);
        let hunks = diff_text(&old, &new);

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].header(), "@@ -7,13 +7,13 @@");
        assert!(counts_match(&hunks[0]));
    }

    #[test]
    fn test_pure_insertion_and_deletion() {
        let old = "a\nb\nc\n";
        let inserted = "a\nb\nnew\nc\n";
        let hunks = diff_text(old, inserted);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].header(), "@@ -1,3 +1,4 @@");
        assert!(hunks[0].to_string().contains("+new\n"));

        let hunks = diff_text(inserted, old);
        assert_eq!(hunks[0].header(), "@@ -1,4 +1,3 @@");
        assert!(hunks[0].to_string().contains("-new\n"));
    }

    #[test]
    fn test_empty_side_uses_preceding_line() {
        let hunks = diff_text("", "x\ny\n");
        assert_eq!(hunks[0].header(), "@@ -0,0 +1,2 @@");

        let hunks = diff_text("x\ny\n", "");
        assert_eq!(hunks[0].header(), "@@ -1,2 +0,0 @@");
    }

    #[test]
    fn test_change_at_file_start_has_no_leading_context() {
        let old = numbered_lines(10);
        let new = numbered_lines_with(10, &[(1, "first")]);
        let hunks = diff_text(&old, &new);
        assert_eq!(hunks[0].header(), "@@ -1,4 +1,4 @@");
        assert_eq!(hunks[0].lines[0].kind, LineKind::Delete);
    }

    #[test]
    fn test_missing_trailing_newline() {
        let hunks = diff_text("a\nb\n", "a\nb");
        assert_eq!(hunks.len(), 1);
        let rendered = hunks[0].to_string();
        assert!(rendered.contains("-b\n+b\n\\ No newline at end of file\n"));
    }

    #[test]
    fn test_reordered_lines_render_as_delete_insert() {
        let hunks = diff_text("a\nb\nc\n", "c\na\nb\n");
        assert!(hunks.iter().all(counts_match));
        let rendered: String = hunks.iter().map(|h| h.to_string()).collect();
        assert!(rendered.contains("+c\n"));
        assert!(rendered.contains("-c\n"));
    }

    #[test]
    fn test_long_insertion_degrades_to_replacement() {
        let old = "head\ntail\n";
        let short = format!("head\n{}tail\n", numbered_lines(10));
        let rendered: String = diff_text(old, &short).iter().map(|h| h.to_string()).collect();
        assert!(!rendered.contains("-tail\n"));

        let long = format!("head\n{}tail\n", numbered_lines(MAX_RESYNC_DISTANCE + 10));
        let hunks = diff_text(old, &long);
        assert_eq!(hunks.len(), 1);
        assert!(counts_match(&hunks[0]));
        let rendered = hunks[0].to_string();
        assert!(rendered.contains("-tail\n"));
        assert!(rendered.contains("+tail\n"));
    }

    #[test]
    fn test_identical_text_has_no_hunks() {
        assert!(diff_text("same\n", "same\n").is_empty());
    }

    #[test]
    fn test_binary_detection() {
        assert!(is_binary(b"abc\0def"));
        assert!(is_binary(&[0xff, 0xfe, 0x41]));
        assert!(!is_binary("plain ✓ text\n".as_bytes()));
    }

    #[test]
    fn test_metadata_mode() {
        let from = snap(0, &[("gone.md", "bye"), ("notes.md", "v1")]);
        let to = snap(1, &[("new.md", "hello"), ("notes.md", "v22")]);
        let d = diff(&to, &from);
        let out = render_unified_metadata(&d, &from, &to);

        assert!(out.contains("diff --git a/new.md b/new.md\nnew file (5 B)\n--- /dev/null\n+++ b/new.md\n"));
        assert!(out.contains("deleted file (3 B)\n--- a/gone.md\n+++ /dev/null\n"));
        assert!(out.contains("@@ -1,2 +1,2 @@\n"));
        assert!(out.contains(&format!("-hash {}\n", hash_bytes(b"v1"))));
        assert!(out.contains(&format!("+hash {}\n", hash_bytes(b"v22"))));
        assert!(out.contains("-size 2\n+hash "));
        assert!(out.contains("+size 3\n"));
    }

    #[test]
    fn test_content_mode() {
        let old_text = numbered_lines(100);
        let new_text = numbered_lines_with(100, &[(50, "line fifty")]);
        let from_files = [
            ("doc.md", old_text.as_str()),
            ("img.bin", "\0\x01"),
            ("old.md", "x"),
        ];
        let to_files = [
            ("doc.md", new_text.as_str()),
            ("img.bin", "\0\x02"),
            ("added.md", "y"),
        ];
        let from_dir = write_tree(&from_files);
        let to_dir = write_tree(&to_files);
        let from = snap(0, &from_files);
        let to = snap(1, &to_files);
        let d = diff(&to, &from);

        let out = render_unified_content(
            &d,
            &DirContent::new(from_dir.path()),
            &DirContent::new(to_dir.path()),
            &from,
            &to,
        )
        .unwrap();

        assert!(out.contains("Binary files a/img.bin and b/img.bin differ\n"));
        assert!(out.contains("new file (1 B)\n--- /dev/null\n+++ b/added.md\n"));
        assert!(out.contains("+++ /dev/null\n"));
        assert_eq!(out.matches("@@ -").count(), 1);
        assert!(out.contains("@@ -47,7 +47,7 @@\n line 47\n"));
        assert!(out.contains("-line 50\n+line fifty\n"));
    }

    #[test]
    fn test_content_mode_propagates_read_errors() {
        let from = snap(0, &[("a.md", "1")]);
        let to = snap(1, &[("a.md", "2")]);
        let d = diff(&to, &from);
        let empty = tempfile::tempdir().unwrap();
        let err = render_unified_content(
            &d,
            &DirContent::new(empty.path()),
            &DirContent::new(empty.path()),
            &from,
            &to,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::Unreadable { .. }));
    }

    #[test]
    fn test_summary() {
        let from = snap(0, &[("a", "1"), ("b", "2")]);
        let to = snap(1, &[("b", "3"), ("c", "4")]);
        let out = render_summary(&diff(&to, &from));
        assert_eq!(out, "A  c\nD  a\nM  b\n1 added, 1 removed, 1 modified\n");
    }
}
