use super::span::Span;

/// A reference to a single line of a text buffer with its byte spans.
#[derive(Debug, Clone, Copy)]
pub struct LineRef<'a> {
    /// Zero-based line index.
    pub index: usize,
    /// Byte span of the line content, excluding `\n` or `\r\n`.
    pub span: Span,
    /// Byte span of the line including its terminator, if any.
    pub full: Span,
    /// The line content without its terminator.
    pub text: &'a str,
}

impl LineRef<'_> {
    /// Whether the line is blank (whitespace only).
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Returns an iterator over lines with their byte spans.
///
/// Always yields at least one line: a trailing newline produces a final
/// empty line, so every byte of `text` is covered by some `full` span.
pub fn lines_with_spans(text: &str) -> impl Iterator<Item = LineRef<'_>> + '_ {
    let mut offset = 0usize;
    text.split('\n').enumerate().map(move |(index, raw)| {
        let start = offset;
        let content = raw.strip_suffix('\r').unwrap_or(raw);
        let has_newline = start + raw.len() < text.len();
        offset = start + raw.len() + 1;
        LineRef {
            index,
            span: Span::new(start, start + content.len()),
            full: Span::new(start, start + raw.len() + usize::from(has_newline)),
            text: content,
        }
    })
}
