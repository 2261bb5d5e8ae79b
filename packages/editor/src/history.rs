//! # History Manager
//!
//! Past/present/future stacks over document snapshots.
//!
//! ## Design
//!
//! - Content-changing intents push the old present onto `past` and clear
//!   `future`
//! - Changes recorded without a key always get their own undo level
//! - Consecutive keyed changes with the same [`ChangeKey`] overwrite the
//!   present instead, so a run of keystrokes is one undo step. Callers opt
//!   in per intent
//! - Undo/redo move the present between the stacks and break any batching
//! - Selection lives outside history and is never restored by undo

/// Identifies changes that may be batched into one undo level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKey {
    /// Attribute update to one block touching exactly these keys
    Attributes { block: String, keys: Vec<String> },
    /// Post edit touching exactly these keys
    PostEdits { keys: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History<T> {
    /// Older states, most recent last
    past: Vec<T>,

    present: T,

    /// Undone states, most recently undone last
    future: Vec<T>,

    /// Maximum number of undo levels (0 = unlimited)
    limit: usize,

    /// Key of the change that produced `present`
    last_key: Option<ChangeKey>,
}

impl<T: Clone> History<T> {
    pub fn new(present: T, limit: usize) -> Self {
        Self {
            past: Vec::new(),
            present,
            future: Vec::new(),
            limit,
            last_key: None,
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    /// Record a content change
    pub fn record(&mut self, next: T, key: Option<ChangeKey>) {
        let overwrite = key.is_some() && key == self.last_key && !self.past.is_empty();
        let previous = std::mem::replace(&mut self.present, next);

        if !overwrite {
            self.past.push(previous);
            if self.limit > 0 && self.past.len() > self.limit {
                self.past.remove(0);
            }
        }

        self.future.clear();
        self.last_key = key;
    }

    /// Swap the present without creating an undo level
    pub fn replace_present(&mut self, next: T) {
        self.present = next;
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push(current);
        self.last_key = None;
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        self.last_key = None;
        true
    }

    /// Drop past and future, keeping `present`
    pub fn reset(&mut self, present: T) {
        self.past.clear();
        self.future.clear();
        self.present = present;
        self.last_key = None;
    }

    /// Apply `f` to every stored state
    pub fn map_all(&mut self, mut f: impl FnMut(&T) -> Option<T>) {
        for state in self
            .past
            .iter_mut()
            .chain(std::iter::once(&mut self.present))
            .chain(self.future.iter_mut())
        {
            if let Some(next) = f(state) {
                *state = next;
            }
        }
    }

    pub fn break_batch(&mut self) {
        self.last_key = None;
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.past.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.future.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
