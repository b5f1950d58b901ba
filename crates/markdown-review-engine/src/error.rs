use thiserror::Error;

use crate::changes::{OperationId, OperationKind};
use crate::critic::AnnotationTag;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Element not found: {0}")]
    UnknownElement(String),

    #[error("Element already exists: {0}")]
    DuplicateElement(String),

    #[error("Could not locate element {element_id} in the source ({matches} candidate matches)")]
    AmbiguousPatchTarget { element_id: String, matches: usize },

    #[error("Operation {operation_id} ({kind}) cannot be applied to the source")]
    UnpatchableOperation {
        operation_id: OperationId,
        kind: OperationKind,
    },

    #[error("Unterminated {tag} annotation at byte {offset}")]
    MalformedAnnotation { offset: usize, tag: AnnotationTag },

    #[error("Draft serialization error: {0}")]
    Draft(#[from] serde_json::Error),
}
