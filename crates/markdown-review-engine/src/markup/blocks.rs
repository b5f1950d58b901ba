use pulldown_cmark::{Event, Options, Parser, Tag};

use super::span::Span;
use crate::changes::{ElementMetadata, ElementType};

/// A top-level block of a markdown string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownBlock {
    /// Byte span of the block, trailing whitespace excluded.
    pub span: Span,
    pub kind: ElementType,
    /// Heading level for `Header` blocks.
    pub level: Option<u8>,
}

impl MarkdownBlock {
    pub fn content<'a>(&self, markdown: &'a str) -> &'a str {
        self.span.slice(markdown)
    }

    pub fn metadata(&self) -> ElementMetadata {
        let metadata = ElementMetadata::new(self.kind);
        match self.level {
            Some(level) => metadata.with_level(level),
            None => metadata,
        }
    }
}

/// Splits markdown into its top-level blocks, in source order.
///
/// Offsets come from pulldown-cmark; the element type of each block is
/// inferred from the opening tag.
pub fn split_blocks(markdown: &str) -> Vec<MarkdownBlock> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
    let mut blocks = Vec::new();
    let mut depth = 0usize;

    for (event, range) in Parser::new_ext(markdown, options).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    let (kind, level) = infer_type(&tag);
                    push_block(&mut blocks, markdown, range.start, range.end, kind, level);
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Rule if depth == 0 => {
                push_block(
                    &mut blocks,
                    markdown,
                    range.start,
                    range.end,
                    ElementType::HorizontalRule,
                    None,
                );
            }
            _ => {}
        }
    }
    blocks
}

fn push_block(
    blocks: &mut Vec<MarkdownBlock>,
    markdown: &str,
    start: usize,
    end: usize,
    kind: ElementType,
    level: Option<u8>,
) {
    let trimmed = markdown[start..end].trim_end();
    if trimmed.trim_start().is_empty() {
        return;
    }
    blocks.push(MarkdownBlock {
        span: Span::new(start, start + trimmed.len()),
        kind,
        level,
    });
}

fn infer_type(tag: &Tag<'_>) -> (ElementType, Option<u8>) {
    match tag {
        Tag::Heading { level, .. } => (ElementType::Header, Some(*level as u8)),
        Tag::BlockQuote(_) => (ElementType::BlockQuote, None),
        Tag::CodeBlock(_) => (ElementType::CodeBlock, None),
        Tag::List(Some(_)) => (ElementType::OrderedList, None),
        Tag::List(None) => (ElementType::BulletList, None),
        Tag::Table(_) => (ElementType::Table, None),
        Tag::FootnoteDefinition(_) => (ElementType::Footnote, None),
        Tag::HtmlBlock => (ElementType::Div, None),
        _ => (ElementType::Para, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_top_level_blocks_with_types() {
        let md = "# Title\n\nFirst paragraph\nstill first.\n\n- a\n- b\n\n> quoted\n\n---\n\n```rust\nfn x() {}\n```\n";
        let blocks = split_blocks(md);

        let summary: Vec<(ElementType, &str)> =
            blocks.iter().map(|b| (b.kind, b.content(md))).collect();
        assert_eq!(
            summary,
            vec![
                (ElementType::Header, "# Title"),
                (ElementType::Para, "First paragraph\nstill first."),
                (ElementType::BulletList, "- a\n- b"),
                (ElementType::BlockQuote, "> quoted"),
                (ElementType::HorizontalRule, "---"),
                (ElementType::CodeBlock, "```rust\nfn x() {}\n```"),
            ]
        );
        assert_eq!(blocks[0].level, Some(1));
    }

    #[test]
    fn ordered_list_and_empty_input() {
        let blocks = split_blocks("1. one\n2. two");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, ElementType::OrderedList);
        assert!(split_blocks("  \n\n").is_empty());
    }
}
