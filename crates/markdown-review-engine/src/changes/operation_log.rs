use std::fmt;

use super::model::DocumentModel;
use super::operation::{Operation, OperationData, OperationId, OperationKind, now_millis};
use crate::error::ReviewError;

/// Handle returned by [`OperationLog::subscribe`].
pub type SubscriptionId = usize;

/// Notification sent to subscribers after an operation is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEvent {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub element_id: String,
}

/// Whether the log holds operations that were not saved yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogState {
    #[default]
    Clean,
    Dirty,
}

type Listener = Box<dyn FnMut(&OperationEvent)>;

/// Append-only operation log over a [`DocumentModel`].
///
/// Every mutation replays the whole log from the model's baseline, so the
/// current state is always exactly `baseline + operations`. Undo moves the
/// last operation onto a redo stack; appending a fresh operation clears it.
/// Operation ids are never reused, not even after undo.
pub struct OperationLog<M: DocumentModel> {
    model: M,
    operations: Vec<Operation>,
    redo_stack: Vec<Operation>,
    next_id: OperationId,
    state: LogState,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl<M: DocumentModel> OperationLog<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            operations: Vec::new(),
            redo_stack: Vec::new(),
            next_id: 1,
            state: LogState::Clean,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The id the next appended operation will receive.
    pub fn next_operation_id(&self) -> OperationId {
        self.next_id
    }

    /// Validates and appends an operation, then replays and notifies.
    pub fn add_operation(
        &mut self,
        element_id: impl Into<String>,
        data: OperationData,
        user_id: Option<&str>,
    ) -> Result<OperationId, ReviewError> {
        let element_id = element_id.into();
        self.model.validate(&element_id, &data)?;

        let operation = Operation {
            id: self.next_id,
            element_id,
            timestamp: now_millis(),
            user_id: user_id.map(str::to_string),
            data,
        };
        self.next_id += 1;
        let event = OperationEvent {
            operation_id: operation.id,
            kind: operation.kind(),
            element_id: operation.element_id.clone(),
        };

        self.operations.push(operation);
        self.redo_stack.clear();
        self.state = LogState::Dirty;
        self.model.reconstruct_state(&self.operations);
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        Ok(event.operation_id)
    }

    /// Undoes the last operation. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(operation) = self.operations.pop() else {
            return false;
        };
        self.redo_stack.push(operation);
        self.state = LogState::Dirty;
        self.model.reconstruct_state(&self.operations);
        true
    }

    /// Re-applies the last undone operation.
    pub fn redo(&mut self) -> bool {
        let Some(operation) = self.redo_stack.pop() else {
            return false;
        };
        self.operations.push(operation);
        self.state = LogState::Dirty;
        self.model.reconstruct_state(&self.operations);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.operations.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// The document as it was after the first `count` operations.
    pub fn state_after_operations(&self, count: usize) -> M::State {
        let count = count.min(self.operations.len());
        self.model.replay(&self.operations[..count])
    }

    pub fn state(&self) -> LogState {
        self.state
    }

    pub fn has_unsaved_operations(&self) -> bool {
        self.state == LogState::Dirty
    }

    pub fn mark_saved(&mut self) {
        self.state = LogState::Clean;
    }

    /// Replaces the log with previously persisted operations.
    ///
    /// Ids keep counting from the highest restored id.
    pub fn restore(&mut self, operations: Vec<Operation>) {
        let highest = operations.iter().map(|op| op.id).max().unwrap_or(0);
        self.next_id = self.next_id.max(highest + 1);
        self.state = if operations.is_empty() {
            LogState::Clean
        } else {
            LogState::Dirty
        };
        self.operations = operations;
        self.redo_stack.clear();
        self.model.reconstruct_state(&self.operations);
    }

    /// Drops every operation and returns to the baseline.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.redo_stack.clear();
        self.state = LogState::Clean;
        self.model.reconstruct_state(&self.operations);
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&OperationEvent) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }
}

impl<M: DocumentModel + fmt::Debug> fmt::Debug for OperationLog<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationLog")
            .field("model", &self.model)
            .field("operations", &self.operations.len())
            .field("redo", &self.redo_stack.len())
            .field("next_id", &self.next_id)
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
