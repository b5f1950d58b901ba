//! Markup primitives shared by the normalizer, diff generator, codec and
//! patcher.
//!
//! Everything here works on plain `&str` with byte offsets: line spans,
//! code fences, blockquote prefixes, list markers and table rows, plus a
//! pulldown-cmark backed splitter for top-level blocks.

mod block_quote;
mod blocks;
mod code_fence;
mod lines;
mod list_marker;
mod span;
mod table_row;

pub use block_quote::BlockQuote;
pub use blocks::{MarkdownBlock, split_blocks};
pub use code_fence::{CodeFence, FenceKind, FenceState};
pub use lines::{LineRef, lines_with_spans};
pub use list_marker::ListMarker;
pub use span::Span;
pub use table_row::TableRow;
