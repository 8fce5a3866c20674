use std::collections::VecDeque;

use crate::document::Model;

/// State of the model before a finished operation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Name of the operation, as passed to `start_operation`.
    pub name: String,
    pub model: Model,
}

/// Two-stack undo/redo history bounded to `limit` entries.
#[derive(Debug)]
pub struct UndoStack {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    limit: usize,
}

impl UndoStack {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Record a finished operation, clearing the redo stack.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.push_undo_only(snapshot);
        self.redo.clear();
    }

    /// Record without clearing redo. Used by `redo()` to re-populate the undo stack.
    pub fn push_undo_only(&mut self, snapshot: Snapshot) {
        if self.limit == 0 {
            return;
        }
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
    }

    pub fn pop_undo(&mut self) -> Option<Snapshot> {
        self.undo.pop_back()
    }

    pub fn push_redo(&mut self, snapshot: Snapshot) {
        self.redo.push(snapshot);
    }

    pub fn pop_redo(&mut self) -> Option<Snapshot> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Names of the undoable operations, most recent last.
    pub fn undo_names(&self) -> Vec<&str> {
        self.undo.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}
