//! Row selection state of one grid instance

use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use async_trait::async_trait;

use crate::entity::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    Single,
    Multiple,
}

impl Default for SelectionMode {
    fn default() -> Self {
        SelectionMode::Single
    }
}

/// Selected rows of a grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    /// Row marked selected in single selection mode
    pub selected_row: Option<usize>,

    /// Selected row indices in multiple selection mode
    pub selected_rows: Vec<usize>,
}

/// The platform's "current element" cursor value
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentElement {
    /// An entity, with the server reference of the selection it belongs to
    Entity {
        entity: Entity,
        owner_selection: Option<String>,
    },
    /// An object scalar bound to a parent source, at a known position
    ObjectScalar { position: usize },
    /// Any other scalar; never maps to a row
    Scalar,
}

/// Access to the current element bound to the grid
#[async_trait]
pub trait ElementCursor: Send + Sync {
    async fn current(&self) -> anyhow::Result<Option<CurrentElement>>;
}

/// Shared selection tracker
#[derive(Debug, Clone)]
pub struct SelectionTracker {
    mode: SelectionMode,
    state: Arc<RwLock<SelectionState>>,
}

impl SelectionTracker {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            state: Arc::new(RwLock::new(SelectionState::default())),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn state(&self) -> SelectionState {
        self.state.read().clone()
    }

    /// Whether a single-mode row is already marked selected
    pub fn has_selected_row(&self) -> bool {
        self.state.read().selected_row.is_some()
    }

    pub fn select_row(&self, row_index: usize) {
        let mut state = self.state.write();
        match self.mode {
            SelectionMode::Single => state.selected_row = Some(row_index),
            SelectionMode::Multiple => {
                if !state.selected_rows.contains(&row_index) {
                    state.selected_rows.push(row_index);
                }
            }
        }
    }

    pub fn set_selected_rows(&self, rows: Vec<usize>) {
        self.state.write().selected_rows = rows;
    }

    /// Deselect everything, e.g. when the bound selection is cleared
    pub fn clear(&self) {
        *self.state.write() = SelectionState::default();
    }
}

impl Default for SelectionTracker {
    fn default() -> Self {
        Self::new(SelectionMode::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_mode_replaces_selection() {
        let tracker = SelectionTracker::new(SelectionMode::Single);
        tracker.select_row(3);
        tracker.select_row(7);
        assert_eq!(tracker.state().selected_row, Some(7));
        assert!(tracker.state().selected_rows.is_empty());
    }

    #[test]
    fn test_multiple_mode_accumulates_once() {
        let tracker = SelectionTracker::new(SelectionMode::Multiple);
        tracker.select_row(1);
        tracker.select_row(1);
        tracker.select_row(2);
        assert_eq!(tracker.state().selected_rows, vec![1, 2]);
        tracker.clear();
        assert_eq!(tracker.state(), SelectionState::default());
    }
}
