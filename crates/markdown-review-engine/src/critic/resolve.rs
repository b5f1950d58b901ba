use super::scan::{Segment, scan_annotations};
use crate::diff::line_prefix_len;
use crate::markup::BlockQuote;

/// Options for [`strip_annotations_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripOptions {
    /// Keep comments as `<!-- review-comment ... -->` instead of dropping
    /// them.
    pub preserve_comments_as_html: bool,
}

/// Resolves every annotation, accepting or rejecting all changes.
pub fn strip_annotations(content: &str, accept: bool) -> String {
    strip_annotations_with(content, accept, StripOptions::default())
}

/// Resolves every annotation.
///
/// Accepting keeps insertions, the new side of substitutions and
/// highlighted text; rejecting keeps deletions and the old side of
/// substitutions. Comments are dropped either way unless preserved as HTML.
/// A line that lost content to the resolution and is left with nothing but
/// structure (whitespace, a bare list marker or quote prefix, empty table
/// cells) is removed afterwards.
pub fn strip_annotations_with(content: &str, accept: bool, options: StripOptions) -> String {
    let mut out = Output::default();

    for segment in scan_annotations(content).segments {
        match segment {
            Segment::Text(text) => out.push(text),
            Segment::Insertion(text) if accept => out.keep(text),
            Segment::Deletion(text) if !accept => out.keep(text),
            Segment::Insertion(_) | Segment::Deletion(_) => out.drop_here(),
            Segment::Substitution { old, new } => {
                out.drop_here();
                out.keep(if accept { new } else { old });
            }
            Segment::Highlight { text, comment } => {
                out.keep(text);
                if let Some(comment) = comment {
                    out.comment(comment, options);
                }
            }
            Segment::Comment(comment) => out.comment(comment, options),
        }
    }
    drop_emptied_lines(&out.text, &out.lines)
}

#[derive(Debug, Clone, Copy, Default)]
struct LineFlags {
    /// Some annotation on the line resolved to nothing.
    dropped: bool,
    /// The line holds content that came out of an annotation.
    annotated: bool,
}

/// Resolved text plus what the resolution did to each of its lines.
#[derive(Default)]
struct Output {
    text: String,
    line: usize,
    lines: Vec<LineFlags>,
}

impl Output {
    fn push(&mut self, s: &str) {
        self.line += s.matches('\n').count();
        self.text.push_str(s);
    }

    /// Pushes content resolved out of an annotation.
    fn keep(&mut self, s: &str) {
        for (i, piece) in s.split('\n').enumerate() {
            if i > 0 {
                self.push("\n");
            }
            self.flags().annotated = true;
            self.push(piece);
        }
    }

    fn drop_here(&mut self) {
        self.flags().dropped = true;
    }

    fn flags(&mut self) -> &mut LineFlags {
        if self.lines.len() <= self.line {
            self.lines.resize(self.line + 1, LineFlags::default());
        }
        &mut self.lines[self.line]
    }

    fn comment(&mut self, comment: &str, options: StripOptions) {
        let body = comment.trim().replace("--", "- -");
        if !options.preserve_comments_as_html || body.is_empty() {
            self.drop_here();
            return;
        }
        self.keep(&format!("<!-- review-comment {body} -->"));
    }
}

fn is_separator(line: &str) -> bool {
    line.trim().is_empty() || BlockQuote::is_bare(line)
}

/// Nothing left but prefixes, whitespace and table pipes.
fn is_structure_only(line: &str) -> bool {
    let rest = &line[line_prefix_len(line)..];
    rest.chars().all(|c| c == '|' || c.is_whitespace())
}

/// Removes lines that lost content and hold nothing but structure. Where a
/// removal leaves two plain separators (blank lines or bare quote lines
/// outside any annotation) meeting, one of them goes too; plain separators
/// a removal leaves at either end of the text all go.
fn drop_emptied_lines(text: &str, flags: &[LineFlags]) -> String {
    let flag = |i: usize| flags.get(i).copied().unwrap_or_default();
    let plain_separator = |i: usize, line: &str| !flag(i).annotated && is_separator(line);

    let mut kept: Vec<(usize, &str)> = Vec::new();
    let mut after_removal = false;
    for (i, line) in text.split('\n').enumerate() {
        if flag(i).dropped && is_structure_only(line) {
            after_removal = true;
            continue;
        }
        if std::mem::take(&mut after_removal) && plain_separator(i, line) {
            match kept.last() {
                None => {
                    // Nothing to separate at the start of the text.
                    after_removal = true;
                    continue;
                }
                Some(&(j, prev)) if plain_separator(j, prev) => {
                    kept.pop();
                }
                Some(_) => {}
            }
        }
        kept.push((i, line));
    }
    if after_removal {
        while kept.last().is_some_and(|&(j, prev)| plain_separator(j, prev)) {
            kept.pop();
        }
    }
    kept.into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}
