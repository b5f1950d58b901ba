use regex::Regex;
use std::sync::OnceLock;

use super::span::Span;

static LIST_MARKER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Width of a tab when measuring list indentation.
const TAB_WIDTH: usize = 4;

/// A bullet (`-`, `*`, `+`) or ordered (`1.`, `1)`) list marker at the start
/// of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker {
    /// Indentation before the marker, in columns.
    pub indent: usize,
    /// Byte span of the marker itself within the line.
    pub marker: Span,
    /// Byte offset where the item body starts (after marker whitespace).
    pub body: usize,
    pub ordered: bool,
}

impl ListMarker {
    /// Parses a list marker at the start of `line`.
    ///
    /// The marker must be followed by whitespace or end the line, so
    /// `-word`, `---` and `1.5` are not list items.
    pub fn parse(line: &str) -> Option<Self> {
        let regex = LIST_MARKER_REGEX.get_or_init(|| {
            Regex::new(r"^([ \t]*)([-*+]|[0-9]{1,9}[.)])(?:[ \t]+|$)")
                .expect("Invalid list marker regex")
        });
        let caps = regex.captures(line)?;
        let indent = caps.get(1)?;
        let marker = caps.get(2)?;
        let width = indent
            .as_str()
            .chars()
            .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
            .sum();

        Some(Self {
            indent: width,
            marker: Span::new(marker.start(), marker.end()),
            body: caps.get(0)?.end(),
            ordered: marker.as_str().ends_with(['.', ')']),
        })
    }

    pub fn marker_text(self, line: &str) -> &str {
        self.marker.slice(line)
    }

    pub fn body_text(self, line: &str) -> &str {
        &line[self.body..]
    }

    /// A list marker with nothing after it, e.g. `- ` or `  2.`.
    pub fn is_bare(line: &str) -> bool {
        Self::parse(line).is_some_and(|m| m.body_text(line).trim().is_empty())
    }
}
