//! # Normalization
//!
//! Canonicalises formatting-only variance so that diffs only ever show
//! changes in substance. The rules:
//!
//! - fenced code regions are left alone (apart from CRLF to LF)
//! - list-like blocks get one space after each marker, blank lines between
//!   items removed and nesting re-indented from an indentation stack
//! - a blank line between two blockquote lines becomes a bare `>`
//! - trailing whitespace is trimmed
//!
//! A block is *list-like* when at least [`NormalizeOptions::list_threshold`]
//! of its non-blank lines carry a list marker; this keeps prose that merely
//! contains one dash-led line from being rewritten.
//!
//! [`Normalized`] additionally records, for every normalized byte, the raw
//! byte it came from, so callers can translate offsets in both directions.
//! The output is idempotent: `normalize(normalize(x)) == normalize(x)`.

use crate::markup::{BlockQuote, FenceState, LineRef, ListMarker, Span, lines_with_spans};

/// Tunable constants of the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// Minimum share of marker lines for a block to be treated as a list.
    pub list_threshold: f32,
    /// Spaces of indentation per bullet parent.
    pub bullet_indent: usize,
    /// Spaces of indentation per ordered parent.
    pub ordered_indent: usize,
}

impl NormalizeOptions {
    pub const DEFAULT_LIST_THRESHOLD: f32 = 0.5;
    pub const DEFAULT_BULLET_INDENT: usize = 2;
    pub const DEFAULT_ORDERED_INDENT: usize = 3;

    /// Nested items must sit at least this far right of their parent to be
    /// recognised as children again after normalization.
    const MIN_NESTING_STEP: usize = 2;

    fn step(&self, ordered: bool) -> usize {
        let step = if ordered {
            self.ordered_indent
        } else {
            self.bullet_indent
        };
        step.max(Self::MIN_NESTING_STEP)
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            list_threshold: Self::DEFAULT_LIST_THRESHOLD,
            bullet_indent: Self::DEFAULT_BULLET_INDENT,
            ordered_indent: Self::DEFAULT_ORDERED_INDENT,
        }
    }
}

/// Normalizes `text` with the default options.
pub fn normalize(text: &str) -> String {
    normalize_with(text, &NormalizeOptions::default())
}

pub fn normalize_with(text: &str, options: &NormalizeOptions) -> String {
    Normalized::new(text, options).into_text()
}

/// Normalized text plus a map back to the raw text it was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    text: String,
    /// Raw byte offset of every normalized byte, plus one entry for the end.
    /// Monotonically non-decreasing.
    offsets: Vec<usize>,
}

impl Normalized {
    pub fn new(raw: &str, options: &NormalizeOptions) -> Self {
        let lines = classify(raw, options);
        let mut out = Builder::with_capacity(raw.len());
        let mut stack: Vec<Frame> = Vec::new();
        let mut emitted_any = false;

        for (i, line) in lines.iter().enumerate() {
            let emit = match line.kind {
                LineKind::Blank => blank_replacement(&lines, i),
                _ => Emit::Line,
            };
            if matches!(emit, Emit::Skip) {
                continue;
            }
            if emitted_any {
                out.raw_char('\n', line.line.full.start.saturating_sub(1));
            }
            emitted_any = true;

            let start = line.line.span.start;
            match (line.kind, emit) {
                (_, Emit::BareQuote) => {
                    stack.clear();
                    out.synth(">", start);
                }
                (LineKind::Blank, _) => stack.clear(),
                (LineKind::Fenced, _) => {
                    stack.clear();
                    out.raw(raw, line.line.span);
                }
                (LineKind::ListItem(marker), _) if line.list_like => {
                    reindent(&mut out, raw, line.line, marker, &mut stack, options);
                }
                _ => {
                    // Only indented continuation lines inside a list keep
                    // the nesting context alive.
                    let continuation = line.line.text.starts_with([' ', '\t']);
                    if !line.list_like || !continuation {
                        stack.clear();
                    }
                    let trimmed = line.line.text.trim_end();
                    out.raw(raw, Span::new(start, start + trimmed.len()));
                }
            }
        }
        out.finish(raw.len())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Maps a normalized byte offset to the raw offset it came from.
    ///
    /// The end of the normalized text maps to the end of the raw text.
    pub fn to_raw(&self, offset: usize) -> usize {
        self.offsets[offset.min(self.text.len())]
    }

    /// Maps the boundary of a change to the raw text.
    ///
    /// Inside a line this is [`Normalized::to_raw`]. At either edge of a
    /// line the boundary moves back to just after the preceding normalized
    /// byte, so that it also covers what the normalizer dropped there:
    /// indentation, trailing whitespace and skipped blank lines.
    pub fn to_raw_boundary(&self, offset: usize, raw: &str) -> usize {
        let offset = offset.min(self.text.len());
        if offset == 0 {
            return 0;
        }
        let late = self.offsets[offset];
        let bytes = self.text.as_bytes();
        let line_edge =
            offset == bytes.len() || bytes[offset] == b'\n' || bytes[offset - 1] == b'\n';
        if !line_edge {
            return late;
        }
        let mut early = (self.offsets[offset - 1] + 1).min(late);
        while !raw.is_char_boundary(early) {
            early += 1;
        }
        early
    }

    /// Maps a raw byte offset to the first normalized byte at or after it.
    pub fn from_raw(&self, raw: usize) -> usize {
        self.offsets
            .partition_point(|&o| o < raw)
            .min(self.text.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Fenced,
    Blank,
    Quote,
    ListItem(ListMarker),
    Text,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    line: LineRef<'a>,
    kind: LineKind,
    /// Whether the line sits in a list-like block.
    list_like: bool,
}

impl Line<'_> {
    fn is_list_item(&self) -> bool {
        self.list_like && matches!(self.kind, LineKind::ListItem(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum Emit {
    Line,
    BareQuote,
    Skip,
}

/// An open list level: its raw indentation, its normalized indentation and
/// whether it is an ordered item.
#[derive(Debug, Clone, Copy)]
struct Frame {
    raw_indent: usize,
    out_indent: usize,
    ordered: bool,
}

fn classify<'a>(raw: &'a str, options: &NormalizeOptions) -> Vec<Line<'a>> {
    let mut fence = FenceState::default();
    let mut lines: Vec<Line<'a>> = lines_with_spans(raw)
        .map(|line| {
            let kind = if fence.step(line.text) {
                LineKind::Fenced
            } else if line.is_blank() {
                LineKind::Blank
            } else if BlockQuote::is_quote_line(line.text) {
                LineKind::Quote
            } else if let Some(marker) = ListMarker::parse(line.text) {
                LineKind::ListItem(marker)
            } else {
                LineKind::Text
            };
            Line {
                line,
                kind,
                list_like: false,
            }
        })
        .collect();

    // Blocks are maximal runs of non-blank lines outside fences.
    let mut start = 0;
    while start < lines.len() {
        if matches!(lines[start].kind, LineKind::Blank | LineKind::Fenced) {
            start += 1;
            continue;
        }
        let end = (start..lines.len())
            .find(|&j| matches!(lines[j].kind, LineKind::Blank | LineKind::Fenced))
            .unwrap_or(lines.len());
        let items = lines[start..end]
            .iter()
            .filter(|l| matches!(l.kind, LineKind::ListItem(_)))
            .count();
        let list_like = items as f32 >= options.list_threshold * (end - start) as f32;
        for line in &mut lines[start..end] {
            line.list_like = list_like;
        }
        start = end;
    }
    lines
}

fn blank_replacement(lines: &[Line<'_>], i: usize) -> Emit {
    let prev = lines[..i].iter().rev().find(|l| l.kind != LineKind::Blank);
    let next = lines[i + 1..].iter().find(|l| l.kind != LineKind::Blank);
    match (prev, next) {
        (Some(p), Some(n)) if p.kind == LineKind::Quote && n.kind == LineKind::Quote => {
            Emit::BareQuote
        }
        (Some(p), Some(n)) if p.is_list_item() && n.is_list_item() => Emit::Skip,
        _ => Emit::Line,
    }
}

fn reindent(
    out: &mut Builder,
    raw: &str,
    line: LineRef<'_>,
    marker: ListMarker,
    stack: &mut Vec<Frame>,
    options: &NormalizeOptions,
) {
    while let Some(top) = stack.last() {
        if top.raw_indent + NormalizeOptions::MIN_NESTING_STEP > marker.indent {
            stack.pop();
        } else {
            break;
        }
    }
    let out_indent = stack
        .last()
        .map_or(0, |parent| parent.out_indent + options.step(parent.ordered));
    stack.push(Frame {
        raw_indent: marker.indent,
        out_indent,
        ordered: marker.ordered,
    });

    let base = line.span.start;
    out.synth(&" ".repeat(out_indent), base);
    out.raw(
        raw,
        Span::new(base + marker.marker.start, base + marker.marker.end),
    );
    let body = marker.body_text(line.text).trim_end();
    if !body.is_empty() {
        out.synth(" ", base + marker.marker.end);
        out.raw(
            raw,
            Span::new(base + marker.body, base + marker.body + body.len()),
        );
    }
}

/// Accumulates normalized text alongside its raw offset map.
struct Builder {
    text: String,
    offsets: Vec<usize>,
}

impl Builder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            offsets: Vec::with_capacity(capacity + 1),
        }
    }

    /// Copies a raw span verbatim.
    fn raw(&mut self, raw: &str, span: Span) {
        self.offsets.extend(span.start..span.end);
        self.text.push_str(span.slice(raw));
    }

    fn raw_char(&mut self, c: char, at: usize) {
        self.offsets.push(at);
        self.text.push(c);
    }

    /// Emits synthesized ASCII text anchored at a raw offset.
    fn synth(&mut self, s: &str, anchor: usize) {
        self.offsets.extend(std::iter::repeat_n(anchor, s.len()));
        self.text.push_str(s);
    }

    fn finish(mut self, raw_len: usize) -> Normalized {
        self.offsets.push(raw_len);
        Normalized {
            text: self.text,
            offsets: self.offsets,
        }
    }
}
