use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use super::element::ElementMetadata;
use crate::diff::TextChange;

/// Monotonically increasing operation identifier, never reused.
pub type OperationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Edit,
    Insert,
    Delete,
    Move,
    SplitReplace,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Edit => "edit",
            OperationKind::Insert => "insert",
            OperationKind::Delete => "delete",
            OperationKind::Move => "move",
            OperationKind::SplitReplace => "split-replace",
        };
        f.write_str(name)
    }
}

/// Where an inserted element goes, relative to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertPosition {
    After(String),
    Before(String),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditData {
    pub old_content: String,
    pub new_content: String,
    pub changes: Vec<TextChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_metadata: Option<ElementMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_metadata: Option<ElementMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertData {
    pub content: String,
    pub metadata: ElementMetadata,
    pub position: InsertPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteData {
    pub original_content: String,
    pub original_metadata: ElementMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveData {
    pub from_index: usize,
    pub to_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One element produced by a split, with the id it will carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSegment {
    pub id: String,
    pub content: String,
    pub metadata: ElementMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitReplaceData {
    pub original_content: String,
    pub segments: Vec<SplitSegment>,
    /// Neighbouring elements merged into the split and removed with it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Kind-specific operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperationData {
    Edit(EditData),
    Insert(InsertData),
    Delete(DeleteData),
    Move(MoveData),
    SplitReplace(SplitReplaceData),
}

impl OperationData {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationData::Edit(_) => OperationKind::Edit,
            OperationData::Insert(_) => OperationKind::Insert,
            OperationData::Delete(_) => OperationKind::Delete,
            OperationData::Move(_) => OperationKind::Move,
            OperationData::SplitReplace(_) => OperationKind::SplitReplace,
        }
    }
}

/// An entry of the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub element_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub data: OperationData,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        self.data.kind()
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ElementType;
    use pretty_assertions::assert_eq;

    #[test]
    fn operation_json_shape() {
        let op = Operation {
            id: 3,
            element_id: "p1".to_string(),
            timestamp: 42,
            user_id: Some("ann".to_string()),
            data: OperationData::Insert(InsertData {
                content: "New".to_string(),
                metadata: ElementMetadata::new(ElementType::Para),
                position: InsertPosition::After("p0".to_string()),
                source: None,
            }),
        };

        let json = serde_json::to_string(&op).expect("serialize");
        assert_eq!(
            json,
            r#"{"id":3,"elementId":"p1","timestamp":42,"userId":"ann","data":{"type":"insert","content":"New","metadata":{"type":"Para"},"position":{"after":"p0"}}}"#
        );
        let back: Operation = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, op);
    }

    #[test]
    fn kind_display_matches_serde_names() {
        let json = serde_json::to_string(&OperationKind::SplitReplace).expect("serialize");
        assert_eq!(json, format!("\"{}\"", OperationKind::SplitReplace));
    }
}
