use std::collections::BTreeSet;

use super::element::Element;
use super::operation::{InsertPosition, Operation, OperationData};
use crate::error::ReviewError;

/// A document that can be rebuilt by replaying operations over a baseline.
pub trait DocumentModel {
    /// The materialised document.
    type State;

    /// Checks that `data` can be applied to `element_id` right now.
    fn validate(&self, element_id: &str, data: &OperationData) -> Result<(), ReviewError>;

    /// Replays `operations` from the baseline, leaving the model untouched.
    fn replay(&self, operations: &[Operation]) -> Self::State;

    /// Rebuilds the current state from the baseline and `operations`.
    fn reconstruct_state(&mut self, operations: &[Operation]);
}

/// Ordered list of elements: a fixed baseline plus the replayed current
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementModel {
    baseline: Vec<Element>,
    current: Vec<Element>,
    /// Every id the baseline or a replayed operation ever introduced,
    /// including ids whose element has since been deleted or absorbed.
    known_ids: BTreeSet<String>,
}

impl ElementModel {
    pub fn new(baseline: Vec<Element>) -> Self {
        let known_ids = baseline.iter().map(|e| e.id.clone()).collect();
        Self {
            current: baseline.clone(),
            baseline,
            known_ids,
        }
    }

    pub fn baseline(&self) -> &[Element] {
        &self.baseline
    }

    pub fn current(&self) -> &[Element] {
        &self.current
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        self.current.iter().find(|e| e.id == id)
    }

    pub fn baseline_element(&self, id: &str) -> Option<&Element> {
        self.baseline.iter().find(|e| e.id == id)
    }

    fn require(&self, id: &str) -> Result<(), ReviewError> {
        match self.find(id) {
            Some(_) => Ok(()),
            None => Err(ReviewError::UnknownElement(id.to_string())),
        }
    }

    /// Ids are never reused, not even those of removed elements.
    fn require_fresh(&self, id: &str) -> Result<(), ReviewError> {
        if self.known_ids.contains(id) {
            return Err(ReviewError::DuplicateElement(id.to_string()));
        }
        Ok(())
    }
}

impl DocumentModel for ElementModel {
    type State = Vec<Element>;

    fn validate(&self, element_id: &str, data: &OperationData) -> Result<(), ReviewError> {
        match data {
            OperationData::Edit(_) | OperationData::Delete(_) | OperationData::Move(_) => {
                self.require(element_id)
            }
            OperationData::Insert(insert) => {
                self.require_fresh(element_id)?;
                match &insert.position {
                    InsertPosition::After(anchor) | InsertPosition::Before(anchor) => {
                        self.require(anchor)
                    }
                    InsertPosition::End => Ok(()),
                }
            }
            OperationData::SplitReplace(split) => {
                self.require(element_id)?;
                for absorbed in &split.absorbed_ids {
                    self.require(absorbed)?;
                }
                for segment in split.segments.iter().filter(|s| s.id != element_id) {
                    self.require_fresh(&segment.id)?;
                }
                Ok(())
            }
        }
    }

    fn replay(&self, operations: &[Operation]) -> Vec<Element> {
        let mut state = self.baseline.clone();
        for operation in operations {
            apply(&mut state, operation);
        }
        state
    }

    fn reconstruct_state(&mut self, operations: &[Operation]) {
        self.current = self.replay(operations);
        self.known_ids = self.baseline.iter().map(|e| e.id.clone()).collect();
        self.known_ids.extend(operations.iter().flat_map(introduced_ids));
        log::debug!(
            "replayed {} operation(s) into {} element(s)",
            operations.len(),
            self.current.len()
        );
    }
}

/// Ids an operation brings into the document.
fn introduced_ids(operation: &Operation) -> Vec<String> {
    match &operation.data {
        OperationData::Insert(_) => vec![operation.element_id.clone()],
        OperationData::SplitReplace(split) => {
            split.segments.iter().map(|s| s.id.clone()).collect()
        }
        OperationData::Edit(_) | OperationData::Delete(_) | OperationData::Move(_) => Vec::new(),
    }
}

fn position_of(state: &[Element], id: &str) -> Option<usize> {
    state.iter().position(|e| e.id == id)
}

fn apply(state: &mut Vec<Element>, operation: &Operation) {
    let id = operation.element_id.as_str();
    match &operation.data {
        OperationData::Edit(edit) => {
            if let Some(element) = state.iter_mut().find(|e| e.id == id) {
                element.content.clone_from(&edit.new_content);
                if let Some(metadata) = &edit.new_metadata {
                    element.metadata = metadata.clone();
                }
            }
        }
        OperationData::Insert(insert) => {
            let anchored = match &insert.position {
                InsertPosition::After(anchor) => position_of(state, anchor).map(|i| (i + 1, i)),
                InsertPosition::Before(anchor) => position_of(state, anchor).map(|i| (i, i)),
                InsertPosition::End => None,
            };
            if anchored.is_none() && insert.position != InsertPosition::End {
                log::warn!("insert anchor for {id} is gone, appending at the end");
            }
            let source_file = anchored
                .map(|(_, anchor)| anchor)
                .or_else(|| state.len().checked_sub(1))
                .and_then(|i| state[i].source_file.clone());
            let mut element = Element::new(id, insert.content.clone(), insert.metadata.clone());
            element.source_file = source_file;
            let at = anchored.map_or(state.len(), |(at, _)| at);
            state.insert(at, element);
        }
        OperationData::Delete(_) => state.retain(|e| e.id != id),
        OperationData::Move(data) => {
            if let Some(from) = position_of(state, id) {
                let element = state.remove(from);
                let to = data.to_index.min(state.len());
                state.insert(to, element);
            }
        }
        OperationData::SplitReplace(split) => {
            let Some(index) = position_of(state, id) else {
                log::warn!("split target {id} is gone, skipping");
                return;
            };
            let source_file = state[index].source_file.clone();
            let source_position = state[index].source_position;
            let removed = |e: &Element| e.id == id || split.absorbed_ids.contains(&e.id);
            let at = state[..index].iter().filter(|e| !removed(*e)).count();
            state.retain(|e| !removed(e));
            let segments = split.segments.iter().map(|segment| {
                let mut element = Element::new(
                    segment.id.clone(),
                    segment.content.clone(),
                    segment.metadata.clone(),
                );
                element.source_file = source_file.clone();
                if segment.id == id {
                    element.source_position = source_position;
                }
                element
            });
            state.splice(at..at, segments);
        }
    }
}
