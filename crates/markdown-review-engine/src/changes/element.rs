use relative_path::RelativePathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Block-level element kinds produced by the document loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Para,
    Header,
    CodeBlock,
    BulletList,
    OrderedList,
    BlockQuote,
    Div,
    FigureCaption,
    TableCaption,
    DocumentTitle,
    Title,
    HorizontalRule,
    Table,
    Footnote,
}

/// Element metadata. Opaque to the diff engine and carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementMetadata {
    #[serde(rename = "type")]
    pub kind: ElementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

impl ElementMetadata {
    pub fn new(kind: ElementType) -> Self {
        Self {
            kind,
            level: None,
            attributes: BTreeMap::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }
}

/// 1-based line/column anchor into the pristine source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

/// A block-level unit of a reviewed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub content: String,
    pub metadata: ElementMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_position: Option<SourcePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<RelativePathBuf>,
}

impl Element {
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: ElementMetadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
            source_position: None,
            source_file: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.source_position = Some(SourcePosition { line, column });
        self
    }

    pub fn in_file(mut self, file: impl Into<RelativePathBuf>) -> Self {
        self.source_file = Some(file.into());
        self
    }
}
