//! # Diff generation
//!
//! Produces the ordered list of [`TextChange`]s that turns one version of
//! an element into another, ignoring everything the normalizer considers
//! formatting noise.
//!
//! The diff runs in two passes over the normalized texts:
//!
//! 1. **Blocks**: non-blank block tokens (lines, with a list item and its
//!    indented continuation lines forming one token) are compared with
//!    Myers. Blank lines only act as separators and are never paired.
//! 2. **Lines and words**: tokens paired inside a replaced region are
//!    compared line by line, and each line word by word with the
//!    blockquote prefix and list marker kept out of the changed span. A
//!    line whose prefix changes is swapped whole; table rows are compared
//!    cell by cell with the pipes kept out.
//!
//! Positions are finally mapped back onto the raw old content through the
//! normalizer's offset map. Whitespace-only additions and deletions are
//! never emitted.
//!
//! Before returning, the change list is checked against every consumer:
//! applied to the raw text and resolved both ways from its annotations it
//! must give back the new and old content. A list that fails the check is
//! replaced by one change swapping the whole element.

mod tokens;

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag, capture_diff_slices};
use std::ops::Range;

use crate::critic::{strip_annotations, to_portable_annotations_with};
use crate::markup::{LineRef, Span, TableRow, lines_with_spans};
use crate::normalize::{NormalizeOptions, Normalized, normalize_with};
pub(crate) use tokens::line_prefix_len;
use tokens::{BlockToken, block_tokens, word_tokens};

/// What a [`TextChange`] does to the old content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Addition,
    Deletion,
    Substitution,
}

/// A single change against the raw old content.
///
/// `position` and `length` are byte offsets. For an addition `length` is
/// the length of the inserted text and nothing of the old content is
/// consumed; for a deletion `text` is the removed text; for a substitution
/// `text` is the new text and `old_text` the replaced text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub position: usize,
    pub length: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
}

impl TextChange {
    pub fn addition(position: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind: ChangeKind::Addition,
            position,
            length: text.len(),
            text,
            old_text: None,
        }
    }

    pub fn deletion(position: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind: ChangeKind::Deletion,
            position,
            length: text.len(),
            text,
            old_text: None,
        }
    }

    pub fn substitution(position: usize, old: impl Into<String>, new: impl Into<String>) -> Self {
        let old = old.into();
        Self {
            kind: ChangeKind::Substitution,
            position,
            length: old.len(),
            text: new.into(),
            old_text: Some(old),
        }
    }

    /// Number of old-content bytes this change consumes.
    pub fn old_len(&self) -> usize {
        match self.kind {
            ChangeKind::Addition => 0,
            ChangeKind::Deletion | ChangeKind::Substitution => self.length,
        }
    }

    /// The span of old content this change covers (empty for additions).
    pub fn old_span(&self) -> Span {
        Span::new(self.position, self.position + self.old_len())
    }
}

/// Computes the changes from `old` to `new` with the default normalizer.
pub fn generate_changes(old: &str, new: &str) -> Vec<TextChange> {
    generate_changes_with(old, new, &NormalizeOptions::default())
}

/// Computes the changes from `old` to `new`.
///
/// Never fails: two texts that normalize equal produce an empty list. The
/// result is sorted by position and no two changes overlap.
pub fn generate_changes_with(old: &str, new: &str, options: &NormalizeOptions) -> Vec<TextChange> {
    let old_norm = Normalized::new(old, options);
    let new_norm = normalize_with(new, options);
    if old_norm.text() == new_norm {
        return Vec::new();
    }

    let changes: Vec<TextChange> = diff_normalized(old_norm.text(), &new_norm)
        .into_iter()
        .filter_map(|change| to_raw_change(change, &old_norm, old))
        .collect();
    if round_trips(old, &changes, old_norm.text(), &new_norm, options) {
        return changes;
    }
    log::debug!(
        "{} fine-grained changes do not resolve cleanly, replacing the element whole",
        changes.len()
    );
    replace_whole(old, &new_norm)
}

/// Applies a change list to the raw old content.
///
/// Changes are applied in position order with a forward cursor; changes
/// that overlap an earlier one or do not fall on a character boundary are
/// skipped.
pub fn apply_changes(old: &str, changes: &[TextChange]) -> String {
    let mut sorted: Vec<&TextChange> = changes.iter().collect();
    sorted.sort_by_key(|c| c.position);

    let mut out = String::with_capacity(old.len());
    let mut cursor = 0;
    for change in sorted {
        let end = change.position + change.old_len();
        if change.position < cursor
            || end > old.len()
            || !old.is_char_boundary(change.position)
            || !old.is_char_boundary(end)
        {
            log::warn!(
                "skipping {:?} at {}: outside the text or overlapping",
                change.kind,
                change.position
            );
            continue;
        }
        out.push_str(&old[cursor..change.position]);
        if change.kind != ChangeKind::Deletion {
            out.push_str(&change.text);
        }
        cursor = end;
    }
    out.push_str(&old[cursor..]);
    out
}

fn to_raw_change(change: TextChange, normalized: &Normalized, raw: &str) -> Option<TextChange> {
    let start = normalized.to_raw_boundary(change.position, raw);
    let end = normalized
        .to_raw_boundary(change.position + change.old_len(), raw)
        .max(start);
    let old_text = &raw[start..end];
    match change.kind {
        ChangeKind::Addition => Some(TextChange::addition(start, change.text)),
        // Text that only existed in normalized form, such as a synthesized
        // `>` line, maps to whitespace and is dropped.
        ChangeKind::Deletion if old_text.trim().is_empty() => None,
        ChangeKind::Deletion => Some(TextChange::deletion(start, old_text)),
        ChangeKind::Substitution => Some(TextChange::substitution(start, old_text, change.text)),
    }
}

/// Whether `changes` carry `old` over to `new` for every consumer: applied
/// to the raw content, and accepted or rejected from the rendered
/// annotations. Only whitespace inside and between lines may differ.
fn round_trips(
    old: &str,
    changes: &[TextChange],
    old_norm: &str,
    new_norm: &str,
    options: &NormalizeOptions,
) -> bool {
    let expected = shape(new_norm);
    if changes.is_empty() {
        return shape(old_norm) == expected;
    }
    if !is_disjoint(changes) {
        return false;
    }
    let resolved = |text: &str| normalize_with(text, options);
    let tracked = to_portable_annotations_with(old, changes, options);
    shape(&resolved(&apply_changes(old, changes))) == expected
        && shape(&resolved(&strip_annotations(&tracked, true))) == expected
        && shape(&resolved(&strip_annotations(&tracked, false))) == shape(old_norm)
}

/// Non-blank lines as (indentation, words).
fn shape(text: &str) -> Vec<(usize, Vec<&str>)> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let indent = line.len() - line.trim_start().len();
            (indent, line.split_whitespace().collect())
        })
        .collect()
}

fn is_disjoint(changes: &[TextChange]) -> bool {
    let mut spans: Vec<Span> = changes.iter().map(TextChange::old_span).collect();
    spans.sort();
    spans.windows(2).all(|pair| pair[0].end <= pair[1].start)
}

/// One change swapping the whole element for its new content.
fn replace_whole(old: &str, new_norm: &str) -> Vec<TextChange> {
    if old.trim().is_empty() {
        vec![TextChange::addition(0, new_norm)]
    } else if new_norm.trim().is_empty() {
        vec![TextChange::deletion(0, old)]
    } else {
        vec![TextChange::substitution(0, old, new_norm)]
    }
}

/// Diffs two normalized texts, positions relative to `old`.
fn diff_normalized(old: &str, new: &str) -> Vec<TextChange> {
    let mut diff = BlockDiff::new(old, new);
    let old_texts: Vec<&str> = diff.old.keys.iter().map(|&k| diff.old.tokens[k].text).collect();
    let new_texts: Vec<&str> = diff.new.keys.iter().map(|&k| diff.new.tokens[k].text).collect();

    for op in capture_diff_slices(Algorithm::Myers, &old_texts, &new_texts) {
        let (tag, o, n) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {}
            DiffTag::Delete => diff.delete_keys(o),
            DiffTag::Insert => diff.insert_keys(o.start, n),
            DiffTag::Replace => {
                let paired = o.len().min(n.len());
                for k in 0..paired {
                    diff.diff_pair(o.start + k, n.start + k);
                }
                if o.len() > paired {
                    diff.delete_keys(o.start + paired..o.end);
                }
                if n.len() > paired {
                    diff.insert_keys(o.end, n.start + paired..n.end);
                }
            }
        }
    }

    let mut changes = diff.changes;
    changes.sort_by_key(|c| c.position);
    changes
}

/// Lines and block tokens of one side, plus the indices of the non-blank
/// tokens.
struct Side<'a> {
    text: &'a str,
    lines: Vec<LineRef<'a>>,
    tokens: Vec<BlockToken<'a>>,
    keys: Vec<usize>,
}

impl<'a> Side<'a> {
    fn new(text: &'a str) -> Self {
        let tokens = block_tokens(text);
        let keys = (0..tokens.len()).filter(|&i| !tokens[i].is_blank()).collect();
        Self {
            text,
            lines: lines_with_spans(text).collect(),
            tokens,
            keys,
        }
    }

    fn key(&self, k: usize) -> &BlockToken<'a> {
        &self.tokens[self.keys[k]]
    }

    /// Span of the lines in `range`, without the final line break.
    fn lines_span(&self, range: Range<usize>) -> Span {
        Span::new(self.lines[range.start].span.start, self.lines[range.end - 1].span.end)
    }
}

struct BlockDiff<'a> {
    old: Side<'a>,
    new: Side<'a>,
    changes: Vec<TextChange>,
}

impl<'a> BlockDiff<'a> {
    fn new(old: &'a str, new: &'a str) -> Self {
        Self {
            old: Side::new(old),
            new: Side::new(new),
            changes: Vec::new(),
        }
    }

    /// Deletes the old keys in `range` together with the separators that
    /// would otherwise be left dangling.
    fn delete_keys(&mut self, range: Range<usize>) {
        let old = &self.old;
        let first = old.keys[range.start];
        let last = old.keys[range.end - 1];

        let span = if range.end == old.keys.len() {
            // Nothing follows: eat the separator in front instead.
            let start = match range.start.checked_sub(1) {
                Some(prev) => old.key(prev).span.end,
                None => old.tokens[first].span.start,
            };
            Span::new(start, old.tokens[last].span.end)
        } else {
            let blank_before = first == 0 || old.tokens[first - 1].is_blank();
            let end = if blank_before {
                old.key(range.end).span.start
            } else {
                old.tokens[last + 1].span.start
            };
            Span::new(old.tokens[first].span.start, end)
        };
        self.changes
            .push(TextChange::deletion(span.start, span.slice(old.text)));
    }

    /// Inserts the new keys in `range` at old key `at`: in front of it, or
    /// after the last old key when `at` is past the end.
    fn insert_keys(&mut self, at: usize, range: Range<usize>) {
        let (old, new) = (&self.old, &self.new);
        let from = new.key(range.start).span.start;
        let to = new.key(range.end - 1).span.end;

        let change = if at < old.keys.len() {
            // The new blocks, then the separator that follows them.
            let text = match new.keys.get(range.end) {
                Some(_) => new.text[from..new.key(range.end).span.start].to_string(),
                None => format!("{}\n", &new.text[from..to]),
            };
            TextChange::addition(old.key(at).span.start, text)
        } else if let Some(last) = at.checked_sub(1) {
            // The separator in front of the new blocks, then the blocks.
            let text = match range.start.checked_sub(1) {
                Some(before) => new.text[new.key(before).span.end..to].to_string(),
                None => format!("\n{}", &new.text[from..to]),
            };
            TextChange::addition(old.key(last).span.end, text)
        } else {
            TextChange::addition(0, &new.text[from..to])
        };
        self.changes.push(change);
    }

    /// Line-by-line diff of a paired old/new key. Keys of different line
    /// counts are swapped whole.
    fn diff_pair(&mut self, old_key: usize, new_key: usize) {
        let a = self.old.key(old_key).lines.clone();
        let b = self.new.key(new_key).lines.clone();
        if a.len() != b.len() {
            self.substitute_lines(a, b);
            return;
        }
        for (o, n) in a.zip(b) {
            self.diff_line(o, n);
        }
    }

    /// Word-level diff of one paired line with the structural prefix kept
    /// out of the changed spans. A line whose prefix changes is swapped
    /// whole, and table rows are compared cell by cell.
    fn diff_line(&mut self, o: usize, n: usize) {
        let a = self.old.lines[o];
        let b = self.new.lines[n];
        if a.text == b.text {
            return;
        }
        let pa = line_prefix_len(a.text);
        let pb = line_prefix_len(b.text);
        if a.text[..pa] != b.text[..pb] {
            self.substitute_lines(o..o + 1, n..n + 1);
            return;
        }

        let (old_body, new_body) = (&a.text[pa..], &b.text[pb..]);
        let base = a.span.start + pa;
        if TableRow::is_row(old_body) && TableRow::is_row(new_body) {
            if TableRow::is_alignment(old_body) || TableRow::is_alignment(new_body) {
                self.substitute_lines(o..o + 1, n..n + 1);
                return;
            }
            let old_cells = TableRow::cells(old_body);
            let new_cells = TableRow::cells(new_body);
            if old_cells.len() == new_cells.len() {
                for (oc, nc) in old_cells.into_iter().zip(new_cells) {
                    self.diff_words(base + oc.start, oc.slice(old_body), nc.slice(new_body));
                }
                return;
            }
        }
        self.diff_words(base, old_body, new_body);
    }

    fn substitute_lines(&mut self, old: Range<usize>, new: Range<usize>) {
        let removed = self.old.lines_span(old);
        let added = self.new.lines_span(new);
        self.changes.push(TextChange::substitution(
            removed.start,
            removed.slice(self.old.text),
            added.slice(self.new.text),
        ));
    }

    fn diff_words(&mut self, base: usize, old: &str, new: &str) {
        let old_words = word_tokens(old);
        let new_words = word_tokens(new);
        let old_texts: Vec<&str> = old_words.iter().map(|(_, w)| *w).collect();
        let new_texts: Vec<&str> = new_words.iter().map(|(_, w)| *w).collect();
        let offset = |i: usize| old_words.get(i).map_or(old.len(), |(at, _)| *at);

        for op in capture_diff_slices(Algorithm::Myers, &old_texts, &new_texts) {
            let (tag, o, n) = op.as_tag_tuple();
            let removed = &old[offset(o.start)..offset(o.end)];
            let added = new_texts[n].concat();
            let position = base + offset(o.start);
            match tag {
                DiffTag::Equal => {}
                DiffTag::Delete if !removed.trim().is_empty() => {
                    self.changes.push(TextChange::deletion(position, removed));
                }
                DiffTag::Insert if !added.trim().is_empty() => {
                    self.changes.push(TextChange::addition(position, added));
                }
                DiffTag::Replace if !(removed.trim().is_empty() && added.trim().is_empty()) => {
                    self.changes
                        .push(TextChange::substitution(position, removed, added));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn appended_list_item_is_one_addition() {
        let changes = generate_changes("- Item 1\n- Item 2", "- Item 1\n- Item 2\n- Item 3");
        assert_eq!(changes, vec![TextChange::addition(17, "\n- Item 3")]);
    }

    #[rstest]
    #[case::list_spacing("-   a\n-   b", "- a\n- b")]
    #[case::quote_gap("> Para A.\n\n> Para B.", "> Para A.\n>\n> Para B.")]
    #[case::trailing_space("Hello world.  ", "Hello world.")]
    #[case::crlf("a\r\nb", "a\nb")]
    #[case::blank_line_added("A\nB", "A\n\nB")]
    fn formatting_only_changes_are_invisible(#[case] old: &str, #[case] new: &str) {
        assert_eq!(generate_changes(old, new), vec![]);
    }

    #[test]
    fn word_substitution() {
        let changes = generate_changes("The quick brown fox", "The slow brown fox");
        assert_eq!(changes, vec![TextChange::substitution(4, "quick", "slow")]);
    }

    #[test]
    fn word_addition_and_deletion() {
        let old = "one two three";
        let changes = generate_changes(old, "one three four");
        let kinds: Vec<ChangeKind> = changes.iter().map(|c| c.kind).collect();

        assert_eq!(kinds, vec![ChangeKind::Deletion, ChangeKind::Addition]);
        assert_eq!(apply_changes(old, &changes), "one three four");
    }

    #[test]
    fn middle_paragraph_deletion_takes_one_separator() {
        let changes = generate_changes("A\n\nB\n\nC", "A\n\nC");
        assert_eq!(changes, vec![TextChange::deletion(3, "B\n\n")]);
    }

    #[test]
    fn last_item_deletion_takes_preceding_newline() {
        let changes = generate_changes("- a\n- b", "- a");
        assert_eq!(changes, vec![TextChange::deletion(3, "\n- b")]);
    }

    #[test]
    fn list_marker_stays_out_of_word_changes() {
        let changes = generate_changes("- apple pie", "- apple tart");
        assert_eq!(changes, vec![TextChange::substitution(8, "pie", "tart")]);
    }

    #[test]
    fn marker_change_substitutes_whole_line() {
        let changes = generate_changes("- a", "1. a");
        assert_eq!(changes, vec![TextChange::substitution(0, "- a", "1. a")]);
    }

    #[test]
    fn positions_are_raw_offsets() {
        // "pie" sits at byte 10 of the raw text, 8 of the normalized one
        let changes = generate_changes("-   apple pie", "- apple tart");
        assert_eq!(changes, vec![TextChange::substitution(10, "pie", "tart")]);
    }

    #[test]
    fn insertion_between_paragraphs() {
        let old = "A\n\nC";
        let new = "A\n\nB\n\nC";
        let changes = generate_changes(old, new);
        assert_eq!(changes, vec![TextChange::addition(3, "B\n\n")]);
        assert_eq!(apply_changes(old, &changes), new);
    }

    #[rstest]
    #[case::list("- x\n- y", "- y\n- y")]
    #[case::lines("Old line\nKeep", "Keep\nKeep")]
    #[case::paragraphs("Intro.\n\nSame.", "Same.\n\nSame.")]
    fn repeated_block_changes_do_not_overlap(#[case] old: &str, #[case] new: &str) {
        let changes = generate_changes(old, new);
        assert!(is_disjoint(&changes), "{changes:?}");
        assert_eq!(apply_changes(old, &changes), new);
    }

    #[test]
    fn changed_prefix_swaps_the_line() {
        let changes = generate_changes("- a\n- b", "- a\n  - b");
        assert_eq!(changes, vec![TextChange::substitution(4, "- b", "  - b")]);
    }

    #[test]
    fn line_edges_cover_dropped_indentation() {
        let changes = generate_changes("a\n  - a", "a\na");
        assert_eq!(changes, vec![TextChange::substitution(2, "  - a", "a")]);
        assert_eq!(apply_changes("a\n  - a", &changes), "a\na");
    }

    #[test]
    fn line_edges_cover_skipped_blank_lines() {
        let old = "- b\n\n- a";
        let changes = generate_changes(old, "- b a");
        assert_eq!(
            changes,
            vec![
                TextChange::addition(3, " a"),
                TextChange::deletion(3, "\n\n- a"),
            ]
        );
        assert_eq!(apply_changes(old, &changes), "- b a");
    }

    #[test]
    fn table_rows_diff_per_cell() {
        let old = "| a | b |\n|---|---|\n| 1 | 2 |";
        let changes = generate_changes(old, "| a | b |\n|---|---|\n| 1 | 3 |");
        assert_eq!(changes, vec![TextChange::substitution(26, "2", "3")]);

        let changes = generate_changes("| a | b |", "| b | c |");
        assert_eq!(
            changes,
            vec![
                TextChange::substitution(2, "a", "b"),
                TextChange::substitution(6, "b", "c"),
            ]
        );
    }

    #[test]
    fn unresolvable_changes_fall_back_to_whole_replacement() {
        assert_eq!(
            replace_whole("old text", "new text"),
            vec![TextChange::substitution(0, "old text", "new text")]
        );
        assert_eq!(replace_whole("", "new"), vec![TextChange::addition(0, "new")]);
        assert_eq!(replace_whole("old", ""), vec![TextChange::deletion(0, "old")]);
        assert!(!is_disjoint(&[
            TextChange::deletion(0, "ab"),
            TextChange::substitution(1, "b", "c"),
        ]));
    }

    #[test]
    fn insertion_at_start_and_into_empty() {
        assert_eq!(
            generate_changes("B", "A\nB"),
            vec![TextChange::addition(0, "A\n")]
        );
        assert_eq!(generate_changes("", "new"), vec![TextChange::addition(0, "new")]);
    }

    #[test]
    fn apply_changes_reproduces_new_text() {
        let old = "# Title\n\nSome words here.\n\n- a\n- b";
        let new = "# Better title\n\nSome other words here.\n\n- a\n- b\n- c";
        let changes = generate_changes(old, new);
        assert_eq!(apply_changes(old, &changes), new);
    }

    #[test]
    fn apply_changes_skips_out_of_range() {
        let changes = vec![TextChange::deletion(10, "nope")];
        assert_eq!(apply_changes("short", &changes), "short");
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_string(&TextChange::substitution(4, "quick", "slow"))
            .expect("serialize");
        assert_eq!(
            json,
            r#"{"type":"substitution","position":4,"length":5,"text":"slow","oldText":"quick"}"#
        );
    }
}
