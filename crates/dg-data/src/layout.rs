//! Column visibility and pinning for one grid instance

use dg_core::column::{AttributeKind, ColumnDescriptor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::persist::ColumnState;

/// Side a column is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pin {
    Left,
    Right,
}

/// Visibility of one column, keyed by column title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnVisibility {
    pub field: String,
    pub is_hidden: bool,
    pub pinned: Option<Pin>,
}

/// Tracks which columns are shown and where they are pinned
///
/// The default layout shows the first `visible_limit` columns of the
/// top-level storage columns followed by the related (dotted) ones; every
/// other column starts hidden.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    entries: Vec<ColumnVisibility>,
    initial: Vec<ColumnVisibility>,
    fingerprint: Vec<(String, AttributeKind)>,
    visible_limit: usize,
}

impl ColumnLayout {
    pub fn new(columns: &[ColumnDescriptor], visible_limit: usize) -> Self {
        let initial = default_layout(columns, visible_limit);
        Self {
            entries: initial.clone(),
            initial,
            fingerprint: fingerprint(columns),
            visible_limit,
        }
    }

    /// Rebuild the defaults when the column configuration changed
    ///
    /// Returns whether the layout was rebuilt.
    pub fn sync_columns(&mut self, columns: &[ColumnDescriptor]) -> bool {
        let next = fingerprint(columns);
        if next == self.fingerprint {
            return false;
        }
        debug!(columns = columns.len(), "Column configuration changed, rebuilding layout");
        *self = Self::new(columns, self.visible_limit);
        true
    }

    pub fn entries(&self) -> &[ColumnVisibility] {
        &self.entries
    }

    pub fn get(&self, field: &str) -> Option<&ColumnVisibility> {
        self.entries.iter().find(|entry| entry.field == field)
    }

    pub fn is_hidden(&self, field: &str) -> bool {
        self.get(field).map(|entry| entry.is_hidden).unwrap_or(false)
    }

    pub fn pinned(&self, field: &str) -> Option<Pin> {
        self.get(field).and_then(|entry| entry.pinned)
    }

    /// Flip visibility; returns false for an unknown field
    pub fn toggle(&mut self, field: &str) -> bool {
        match self.entries.iter_mut().find(|entry| entry.field == field) {
            Some(entry) => {
                entry.is_hidden = !entry.is_hidden;
                true
            }
            None => false,
        }
    }

    /// Pin or unpin a column; returns false for an unknown field
    pub fn pin(&mut self, field: &str, pin: Option<Pin>) -> bool {
        match self.entries.iter_mut().find(|entry| entry.field == field) {
            Some(entry) => {
                entry.pinned = pin;
                true
            }
            None => false,
        }
    }

    /// Back to the default layout
    pub fn reset(&mut self) {
        self.entries = self.initial.clone();
    }

    /// Take visibility and pinning from a persisted column state
    ///
    /// Fields the state does not mention keep their current entry.
    pub fn apply_column_state(&mut self, state: &[ColumnState]) {
        for column in state {
            let hidden = column.hide.unwrap_or(false);
            match self.entries.iter_mut().find(|entry| entry.field == column.col_id) {
                Some(entry) => {
                    entry.is_hidden = hidden;
                    entry.pinned = column.pinned;
                }
                None => debug!(column = %column.col_id, "Column state for unknown column ignored"),
            }
        }
    }

    /// Current layout as grid column state
    pub fn column_state(&self) -> Vec<ColumnState> {
        self.merge_column_state(&[])
    }

    /// Overlay visibility and pinning onto the state the grid last reported
    ///
    /// Reported entries keep their order, width, sort and flex. Columns the
    /// grid did not report are appended in layout order.
    pub fn merge_column_state(&self, reported: &[ColumnState]) -> Vec<ColumnState> {
        let mut merged: Vec<ColumnState> = reported
            .iter()
            .map(|column| match self.get(&column.col_id) {
                Some(entry) => ColumnState {
                    hide: Some(entry.is_hidden),
                    pinned: entry.pinned,
                    ..column.clone()
                },
                None => column.clone(),
            })
            .collect();

        let missing: Vec<ColumnState> = self
            .entries
            .iter()
            .filter(|entry| !reported.iter().any(|column| column.col_id == entry.field))
            .map(|entry| ColumnState {
                hide: Some(entry.is_hidden),
                pinned: entry.pinned,
                ..ColumnState::new(entry.field.clone())
            })
            .collect();
        merged.extend(missing);
        merged
    }

    /// Entries in properties-dialog order: top-level storage, then related
    pub fn display_order<'a>(&'a self, columns: &[ColumnDescriptor]) -> Vec<&'a ColumnVisibility> {
        let ordered = ordered_titles(columns);
        ordered.iter().filter_map(|title| self.get(title)).collect()
    }
}

fn fingerprint(columns: &[ColumnDescriptor]) -> Vec<(String, AttributeKind)> {
    columns.iter().map(|c| (c.title.clone(), c.kind)).collect()
}

fn ordered_titles(columns: &[ColumnDescriptor]) -> Vec<String> {
    let top_level = columns
        .iter()
        .filter(|c| c.kind == AttributeKind::Storage && !c.is_related());
    let related = columns.iter().filter(|c| c.is_related());
    top_level.chain(related).map(|c| c.title.clone()).collect()
}

fn default_layout(columns: &[ColumnDescriptor], visible_limit: usize) -> Vec<ColumnVisibility> {
    let visible: Vec<String> = ordered_titles(columns).into_iter().take(visible_limit).collect();
    columns
        .iter()
        .map(|column| ColumnVisibility {
            field: column.title.clone(),
            is_hidden: !visible.contains(&column.title),
            pinned: None,
        })
        .collect()
}
