//! # Annotation codec
//!
//! Inline change annotations in two flavours:
//!
//! - **portable**: CriticMarkup-style `{++added++}`, `{--deleted--}`,
//!   `{~~old~>new~~}`, `{==highlight==}` and `{>>comment<<}`, plain UTF-8
//!   that survives a commit to the source repository
//! - **presentation**: `<ins>`/`<del>` tags with review classes, for
//!   rendering in the review UI
//!
//! Encoding works over the normalized old content. Spans never cross a
//! newline, and indentation, removed list markers and table pipes stay
//! outside them so that resolving the annotations yields well-formed
//! markdown again. Spacing in the middle of a line travels inside the span.
//!
//! [`strip_annotations`] resolves portable annotations by accepting or
//! rejecting all of them at once.

mod encode;
mod resolve;
mod scan;

pub use encode::{
    Attribution, to_portable_annotations, to_portable_annotations_with, to_presentation_markup,
    to_presentation_markup_with,
};
pub use resolve::{StripOptions, strip_annotations, strip_annotations_with};
pub use scan::{AnnotationScan, AnnotationTag, Segment, Unterminated, scan_annotations, validate_annotations};
