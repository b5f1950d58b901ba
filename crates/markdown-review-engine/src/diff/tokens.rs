//! Tokenization for the two diff passes: block tokens (lines, with list
//! items swallowing their indented continuation lines) and word tokens.

use std::ops::Range;

use crate::markup::{BlockQuote, FenceState, ListMarker, Span, lines_with_spans};

/// One block-level unit of a (normalized) document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockToken<'a> {
    /// Span of the token content, without its final line terminator.
    pub span: Span,
    pub text: &'a str,
    /// Indices of the lines the token covers.
    pub lines: Range<usize>,
}

impl BlockToken<'_> {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

pub(crate) fn block_tokens(text: &str) -> Vec<BlockToken<'_>> {
    let lines: Vec<_> = lines_with_spans(text).collect();
    let mut fence = FenceState::default();
    let mut fenced: Vec<bool> = lines.iter().map(|l| fence.step(l.text)).collect();
    fenced.push(false);

    let mut tokens = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let start = lines[i].span.start;
        let mut last = i;
        let marker = if fenced[i] {
            None
        } else {
            ListMarker::parse(lines[i].text)
        };
        if let Some(marker) = marker {
            while last + 1 < lines.len() {
                let next = &lines[last + 1];
                if fenced[last + 1] || next.is_blank() || ListMarker::parse(next.text).is_some() {
                    break;
                }
                let indent = next.text.len() - next.text.trim_start().len();
                if indent <= marker.indent {
                    break;
                }
                last += 1;
            }
        }
        let span = Span::new(start, lines[last].span.end);
        tokens.push(BlockToken {
            span,
            text: span.slice(text),
            lines: i..last + 1,
        });
        i = last + 1;
    }
    tokens
}

/// Length of the structural prefix of a line: indentation, blockquote
/// prefixes and a list marker with its trailing space.
pub(crate) fn line_prefix_len(line: &str) -> usize {
    let (_, offset) = BlockQuote::strip_prefixes(line);
    let rest = &line[offset..];
    match ListMarker::parse(rest) {
        Some(marker) => offset + marker.body,
        None => offset,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Word,
    Punct,
}

fn class_of(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Space
    } else if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

/// Splits text into words, whitespace runs and single punctuation
/// characters. Each token carries its byte offset.
pub(crate) fn word_tokens(text: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<CharClass> = None;

    for (i, c) in text.char_indices() {
        let class = class_of(c);
        let joins = current == Some(class) && class != CharClass::Punct;
        if !joins {
            if i > start {
                tokens.push((start, &text[start..i]));
            }
            start = i;
        }
        current = Some(class);
    }
    if start < text.len() {
        tokens.push((start, &text[start..]));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts<'a>(tokens: &[BlockToken<'a>]) -> Vec<&'a str> {
        tokens.iter().map(|t| t.text).collect()
    }

    #[test]
    fn list_items_swallow_continuations() {
        let text = "- one\n  more of one\n- two\nplain\n\n  indented";
        assert_eq!(
            texts(&block_tokens(text)),
            vec!["- one\n  more of one", "- two", "plain", "", "  indented"]
        );
        let lines: Vec<_> = block_tokens(text).into_iter().map(|t| t.lines).collect();
        assert_eq!(lines, vec![0..2, 2..3, 3..4, 4..5, 5..6]);
    }

    #[test]
    fn fenced_lines_are_separate_tokens() {
        let text = "```\n- a\n  b\n```";
        assert_eq!(texts(&block_tokens(text)), vec!["```", "- a", "  b", "```"]);
    }

    #[test]
    fn prefix_lengths() {
        assert_eq!(line_prefix_len("- item"), 2);
        assert_eq!(line_prefix_len("> > 1. quoted"), 7);
        assert_eq!(line_prefix_len("  text"), 2);
        assert_eq!(line_prefix_len("text"), 0);
        assert_eq!(line_prefix_len(">"), 1);
        assert_eq!(line_prefix_len("-"), 1);
    }

    #[test]
    fn words_whitespace_and_punctuation() {
        let words: Vec<&str> = word_tokens("Hello,  world!!")
            .into_iter()
            .map(|(_, w)| w)
            .collect();
        assert_eq!(words, vec!["Hello", ",", "  ", "world", "!", "!"]);
    }
}
