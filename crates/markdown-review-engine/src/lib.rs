//! Change tracking and source reconciliation for reviewed markdown.
//!
//! A review session records every edit as an operation over a baseline
//! list of elements ([`changes`]), diffs each element against its baseline
//! with formatting noise normalized away ([`normalize`], [`diff`]), renders
//! the result as inline annotations ([`critic`]) and finally projects the
//! edits back onto the pristine source text ([`patch`]).

pub mod changes;
pub mod context;
pub mod critic;
pub mod diff;
pub mod error;
pub mod markup;
pub mod normalize;
pub mod patch;

// Re-export key types for easier usage
pub use changes::{
    ChangeTracker, Element, ElementMetadata, ElementType, InsertPosition, Operation,
    OperationData, OperationKind, ReplacementSegment, SourcePosition, SplitResult,
};
pub use context::{KeyValueStore, MemoryStore, ReviewContext};
pub use critic::{
    Attribution, strip_annotations, to_portable_annotations, to_presentation_markup,
    validate_annotations,
};
pub use diff::{ChangeKind, TextChange, apply_changes, generate_changes};
pub use error::ReviewError;
pub use normalize::{NormalizeOptions, normalize};
pub use patch::{patch, patch_file};
