//! # Change tracking
//!
//! A reviewed document is an ordered list of [`Element`]s. Every edit the
//! reviewer makes is recorded as an [`Operation`] in an append-only
//! [`OperationLog`]; the current document is always the baseline with the
//! log replayed on top, which makes undo, redo and historical snapshots
//! plain replays.
//!
//! [`ChangeTracker`] is the session facade used by the UI and the CLI.

mod element;
mod model;
mod operation;
mod operation_log;
mod tracker;

pub use element::{Element, ElementMetadata, ElementType, SourcePosition};
pub use model::{DocumentModel, ElementModel};
pub use operation::{
    DeleteData, EditData, InsertData, InsertPosition, MoveData, Operation, OperationData,
    OperationId, OperationKind, SplitReplaceData, SplitSegment,
};
pub use operation_log::{LogState, OperationEvent, OperationLog, SubscriptionId};
pub use tracker::{ChangeTracker, ReplacementSegment, SplitResult};
pub(crate) use tracker::render_markdown;
