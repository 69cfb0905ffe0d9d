//! Action log: the ordered record of drawing operations behind one canvas.
//!
//! DESIGN
//! ======
//! Order reflects arrival at this participant only; concurrent edits from
//! different peers may land in different orders elsewhere. `Clear` and `Undo`
//! are structural: they reshape the log instead of being stored in it, so a
//! full-state snapshot taken after a clear is empty.

use crate::action::DrawingAction;

/// What applying one action did to the log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogChange {
    Appended,
    Cleared { removed: usize },
    /// The removed entry, or `None` when the log was already empty.
    Undone(Option<DrawingAction>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionLog {
    actions: Vec<DrawingAction>,
}

impl ActionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action the way the canvas would: strokes and emoji append,
    /// `Clear` empties, `Undo` drops the most recent entry.
    pub fn apply(&mut self, action: DrawingAction) -> LogChange {
        match action {
            DrawingAction::Clear => LogChange::Cleared { removed: self.clear() },
            DrawingAction::Undo => LogChange::Undone(self.undo_last()),
            other => {
                self.actions.push(other);
                LogChange::Appended
            }
        }
    }

    /// Empty the log, returning how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.actions.len();
        self.actions.clear();
        removed
    }

    /// Remove the most recent entry. No-op on an empty log.
    pub fn undo_last(&mut self) -> Option<DrawingAction> {
        self.actions.pop()
    }

    /// Adopt another participant's log wholesale. Nothing is merged.
    pub fn replace(&mut self, actions: Vec<DrawingAction>) {
        self.actions = actions;
    }

    #[must_use]
    pub fn actions(&self) -> &[DrawingAction] {
        &self.actions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
#[path = "action_log_test.rs"]
mod tests;
