use crate::diff::{ChangeKind, TextChange, line_prefix_len};
use crate::markup::TableRow;
use crate::normalize::{NormalizeOptions, Normalized};

/// Reviewer identity rendered into presentation markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub author: String,
    /// CSS colour, e.g. `#4f46e5`.
    pub color: String,
}

/// Renders `changes` inline into `old` using the portable `{++ ++}` syntax.
///
/// The result is built over the normalized old content; text outside the
/// changes is left as is.
pub fn to_portable_annotations(old: &str, changes: &[TextChange]) -> String {
    to_portable_annotations_with(old, changes, &NormalizeOptions::default())
}

pub fn to_portable_annotations_with(
    old: &str,
    changes: &[TextChange],
    options: &NormalizeOptions,
) -> String {
    render(old, changes, options, &Portable)
}

/// Renders `changes` inline into `old` as `<ins>`/`<del>` markup.
pub fn to_presentation_markup(old: &str, changes: &[TextChange]) -> String {
    to_presentation_markup_with(old, changes, None, &NormalizeOptions::default())
}

pub fn to_presentation_markup_with(
    old: &str,
    changes: &[TextChange],
    attribution: Option<&Attribution>,
    options: &NormalizeOptions,
) -> String {
    render(old, changes, options, &Presentation::new(attribution))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Insert,
    Delete,
}

/// How a single-line change is wrapped.
trait Style {
    fn wrap(&self, out: &mut String, mark: Mark, text: &str);

    fn substitution(&self, out: &mut String, old: &str, new: &str) {
        self.wrap(out, Mark::Delete, old);
        self.wrap(out, Mark::Insert, new);
    }

    /// Whether the list marker of an inserted line goes outside the span.
    fn marker_outside_insertions(&self) -> bool;
}

struct Portable;

impl Style for Portable {
    fn wrap(&self, out: &mut String, mark: Mark, text: &str) {
        let (open, close) = match mark {
            Mark::Insert => ("{++", "++}"),
            Mark::Delete => ("{--", "--}"),
        };
        out.push_str(open);
        out.push_str(text);
        out.push_str(close);
    }

    fn substitution(&self, out: &mut String, old: &str, new: &str) {
        out.push_str("{~~");
        out.push_str(old);
        out.push_str("~>");
        out.push_str(new);
        out.push_str("~~}");
    }

    fn marker_outside_insertions(&self) -> bool {
        false
    }
}

struct Presentation {
    /// Extra attributes shared by every tag, already escaped.
    attributes: String,
}

impl Presentation {
    fn new(attribution: Option<&Attribution>) -> Self {
        let attributes = attribution.map_or_else(String::new, |a| {
            format!(
                r#" data-critic-author="{}" data-critic-color="{}""#,
                html_escape::encode_double_quoted_attribute(&a.author),
                html_escape::encode_double_quoted_attribute(&a.color),
            )
        });
        Self { attributes }
    }
}

impl Style for Presentation {
    fn wrap(&self, out: &mut String, mark: Mark, text: &str) {
        let (tag, class, kind) = match mark {
            Mark::Insert => ("ins", "review-addition", "addition"),
            Mark::Delete => ("del", "review-deletion", "deletion"),
        };
        out.push_str(&format!(
            r#"<{tag} class="{class}" data-critic-type="{kind}"{}>{text}</{tag}>"#,
            self.attributes
        ));
    }

    fn marker_outside_insertions(&self) -> bool {
        true
    }
}

fn render(old: &str, changes: &[TextChange], options: &NormalizeOptions, style: &dyn Style) -> String {
    if changes.is_empty() {
        return old.to_string();
    }
    let normalized = Normalized::new(old, options);
    let text = normalized.text();

    let mut sorted: Vec<&TextChange> = changes.iter().collect();
    sorted.sort_by_key(|c| c.position);

    let mut out = String::with_capacity(text.len() + changes.len() * 32);
    let mut cursor = 0;
    for change in sorted {
        let start = normalized.from_raw(change.position).max(cursor);
        let end = normalized
            .from_raw(change.position + change.old_len())
            .max(start);
        out.push_str(&text[cursor..start]);

        let removed = &text[start..end];
        match change.kind {
            ChangeKind::Addition => encode_lines(&mut out, &change.text, Mark::Insert, style),
            ChangeKind::Deletion => encode_lines(&mut out, removed, Mark::Delete, style),
            ChangeKind::Substitution if is_inline(&out, removed, &change.text) => {
                style.substitution(&mut out, removed, &change.text);
            }
            ChangeKind::Substitution => {
                encode_lines(&mut out, removed, Mark::Delete, style);
                if !removed.is_empty() && !change.text.is_empty() && !at_line_start(&out) {
                    out.push('\n');
                }
                encode_lines(&mut out, &change.text, Mark::Insert, style);
            }
        }
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn at_line_start(out: &str) -> bool {
    out.is_empty() || out.ends_with('\n')
}

/// A substitution renders inline when both sides are single, non-empty
/// pieces and neither starts a line with structure of its own. Otherwise
/// the old lines are deleted and the new ones inserted below them.
fn is_inline(out: &str, old: &str, new: &str) -> bool {
    if old.is_empty() || new.is_empty() || old.contains('\n') || new.contains('\n') {
        return false;
    }
    let structural = |s: &str| line_prefix_len(s) > 0 || TableRow::is_row(s);
    !(at_line_start(out) && (structural(old) || structural(new)))
}

/// Wraps `text` line by line so that no span crosses a newline.
fn encode_lines(out: &mut String, text: &str, mark: Mark, style: &dyn Style) {
    for (i, piece) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let line_start = at_line_start(out);
        encode_piece(out, piece, mark, line_start, style);
    }
}

fn encode_piece(out: &mut String, piece: &str, mark: Mark, line_start: bool, style: &dyn Style) {
    if piece.trim().is_empty() {
        // Whitespace is carried along for insertions and simply omitted
        // from deletions.
        if mark == Mark::Insert {
            out.push_str(piece);
        }
        return;
    }
    if !line_start {
        // Mid-line whitespace stays inside the span so that resolving it
        // either way restores the spacing.
        style.wrap(out, mark, piece);
        return;
    }

    let body = piece.trim_start();
    out.push_str(&piece[..piece.len() - body.len()]);
    let mut body = body;
    if mark == Mark::Delete || style.marker_outside_insertions() {
        let prefix = line_prefix_len(body);
        if prefix > 0 && !body[prefix..].trim().is_empty() {
            out.push_str(&body[..prefix]);
            body = &body[prefix..];
        }
    }
    if TableRow::is_row(body) && !TableRow::is_alignment(body) {
        encode_cells(out, body, mark, style);
    } else {
        style.wrap(out, mark, body);
    }
}

/// Wraps each non-empty cell of a table row, leaving pipes and cell
/// padding outside. A row without any cell content is wrapped whole.
fn encode_cells(out: &mut String, row: &str, mark: Mark, style: &dyn Style) {
    let cells = TableRow::cells(row);
    if cells.iter().all(|cell| cell.slice(row).trim().is_empty()) {
        style.wrap(out, mark, row);
        return;
    }
    let mut cursor = 0;
    for cell in cells {
        out.push_str(&row[cursor..cell.start]);
        let content = cell.slice(row);
        let inner = content.trim();
        if inner.is_empty() {
            out.push_str(content);
        } else {
            let lead = content.len() - content.trim_start().len();
            out.push_str(&content[..lead]);
            style.wrap(out, mark, inner);
            out.push_str(&content[lead + inner.len()..]);
        }
        cursor = cell.end;
    }
    out.push_str(&row[cursor..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critic::strip_annotations;
    use crate::diff::generate_changes;
    use pretty_assertions::assert_eq;

    fn portable(old: &str, new: &str) -> String {
        to_portable_annotations(old, &generate_changes(old, new))
    }

    fn presentation(old: &str, new: &str) -> String {
        to_presentation_markup(old, &generate_changes(old, new))
    }

    #[test]
    fn appended_item_keeps_marker_inside() {
        assert_eq!(
            portable("- Item 1\n- Item 2", "- Item 1\n- Item 2\n- Item 3"),
            "- Item 1\n- Item 2\n{++- Item 3++}"
        );
    }

    #[test]
    fn presentation_keeps_marker_outside() {
        assert_eq!(
            presentation("- Item 1\n- Item 2", "- Item 1\n- Item 2\n- Item 3"),
            r#"- Item 1
- Item 2
- <ins class="review-addition" data-critic-type="addition">Item 3</ins>"#
        );
    }

    #[test]
    fn substitution_inline() {
        assert_eq!(
            portable("The quick brown fox", "The slow brown fox"),
            "The {~~quick~>slow~~} brown fox"
        );
        assert_eq!(
            presentation("The quick brown fox", "The slow brown fox"),
            r#"The <del class="review-deletion" data-critic-type="deletion">quick</del><ins class="review-addition" data-critic-type="addition">slow</ins> brown fox"#
        );
    }

    #[test]
    fn deleted_item_keeps_marker_outside() {
        assert_eq!(portable("- a\n- b", "- a"), "- a\n- {--b--}");
    }

    #[test]
    fn deleted_paragraph_keeps_newlines_outside() {
        assert_eq!(portable("A\n\nB\n\nC", "A\n\nC"), "A\n\n{--B--}\n\nC");
    }

    #[test]
    fn multi_line_insertion_is_split_per_line() {
        assert_eq!(
            portable("A\n\nD", "A\n\nB\nC\n\nD"),
            "A\n\n{++B++}\n{++C++}\n\nD"
        );
    }

    #[test]
    fn renders_over_normalized_old_content() {
        assert_eq!(
            portable("-   apple pie", "- apple tart"),
            "- apple {~~pie~>tart~~}"
        );
    }

    #[test]
    fn no_changes_returns_old_unchanged() {
        assert_eq!(to_portable_annotations("-   raw", &[]), "-   raw");
    }

    #[test]
    fn attribution_is_escaped() {
        let attribution = Attribution {
            author: r#"Ann "A""#.to_string(),
            color: "#123456".to_string(),
        };
        let changes = generate_changes("a", "a b");
        let html = to_presentation_markup_with(
            "a",
            &changes,
            Some(&attribution),
            &NormalizeOptions::default(),
        );
        assert_eq!(
            html,
            r##"a<ins class="review-addition" data-critic-type="addition" data-critic-author="Ann &quot;A&quot;" data-critic-color="#123456"> b</ins>"##
        );
    }

    #[test]
    fn changed_marker_is_deleted_and_reinserted() {
        assert_eq!(
            portable("- a\n- b", "- a\n  - b"),
            "- a\n- {--b--}\n  {++- b++}"
        );
        assert_eq!(portable("- apple", "1. apple"), "- {--apple--}\n{++1. apple++}");
        assert_eq!(
            presentation("- apple", "1. apple"),
            r#"- <del class="review-deletion" data-critic-type="deletion">apple</del>
1. <ins class="review-addition" data-critic-type="addition">apple</ins>"#
        );
    }

    #[test]
    fn spacing_stays_inside_mid_line_insertions() {
        let tracked = portable("b", "a b");
        assert_eq!(tracked, "{++a ++}b");
        assert_eq!(strip_annotations(&tracked, false), "b");
        assert_eq!(portable("a b", "b"), "{--a --}b");
    }

    #[test]
    fn table_cells_are_wrapped_inside_the_pipes() {
        let old = "| a | b |\n|---|---|\n| 1 | 2 |";
        assert_eq!(
            portable(old, "| a | b |\n|---|---|\n| 1 | 3 |"),
            "| a | b |\n|---|---|\n| 1 | {~~2~>3~~} |"
        );
        assert_eq!(
            portable("| a |\n|---|", "| a |\n|---|\n| 1 |"),
            "| a |\n|---|\n| {++1++} |"
        );
        assert_eq!(
            portable("| a | b |", "| b | c |"),
            "| {~~a~>b~~} | {~~b~>c~~} |"
        );
    }

    #[test]
    fn alignment_row_is_swapped_whole() {
        let tracked = portable("| a |\n|---|", "| a |\n|:-:|");
        assert_eq!(tracked, "| a |\n{--|---|--}\n{++|:-:|++}");
        assert_eq!(strip_annotations(&tracked, true), "| a |\n|:-:|");
        assert_eq!(strip_annotations(&tracked, false), "| a |\n|---|");
    }

    #[test]
    fn quote_paragraph_insertion_resolves_both_ways() {
        let old = "> Para A.";
        let tracked = portable(old, "> Para A.\n\n> Para B.");
        assert_eq!(tracked, "> Para A.\n{++>++}\n{++> Para B.++}");
        assert_eq!(strip_annotations(&tracked, true), "> Para A.\n>\n> Para B.");
        assert_eq!(strip_annotations(&tracked, false), old);
    }
}
