//! Bounded undo history for destructive dataset edits.

use std::collections::VecDeque;

use ndarray::Array2;

use crate::dataset::Dataset;

/// What a destructive operation saves before mutating: the dataset and the
/// projection that was valid for it. Restoring one rebuilds everything else.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset: Dataset,
    pub projection: Array2<f64>,
}

/// Outcome of an undo request. An empty stack is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum UndoOutcome {
    Restored,
    NothingToUndo,
}

impl UndoOutcome {
    pub fn restored(self) -> bool {
        self == UndoOutcome::Restored
    }
}

/// LIFO snapshot stack with a depth bound; the oldest snapshot is dropped
/// when the bound is hit.
pub struct UndoStack {
    stack: VecDeque<Snapshot>,
    capacity: usize,
}

pub const DEFAULT_UNDO_DEPTH: usize = 32;

impl UndoStack {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_UNDO_DEPTH)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        UndoStack {
            stack: VecDeque::with_capacity(capacity.min(DEFAULT_UNDO_DEPTH)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.stack.len() == self.capacity {
            self.stack.pop_front();
        }
        self.stack.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<Snapshot> {
        self.stack.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}
