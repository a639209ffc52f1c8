//! Persisted grid state and named views
//!
//! State is kept either in keyed local blobs (`gridState_<node>`,
//! `savedViews_<node>`) or merged into a single remote JSON value with
//! `columnState`, `filterModel` and `savedViews` keys.

pub mod store;
pub mod views;

use chrono::{DateTime, Utc};
use dg_core::filter::FilterModel;
use dg_core::sort::SortDirection;
use serde::{Deserialize, Serialize};

use crate::layout::Pin;

pub use store::{
    BlobStore, FileBlobStore, LocalBlobStore, MemoryBlobStore, MemoryStateHandle, RemoteStateStore,
    StateHandle, StateStore,
};
pub use views::{StateUpdateSource, ViewStateManager};

/// Grid state of one column
///
/// Unknown keys written by the grid are ignored on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnState {
    pub col_id: String,
    pub hide: Option<bool>,
    pub pinned: Option<Pin>,
    pub width: Option<f32>,
    pub sort: Option<SortDirection>,
    pub sort_index: Option<u32>,
    pub flex: Option<f32>,
}

impl ColumnState {
    pub fn new(col_id: impl Into<String>) -> Self {
        Self {
            col_id: col_id.into(),
            ..Default::default()
        }
    }
}

/// Column state and filters restored when a grid starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridState {
    pub column_state: Vec<ColumnState>,
    pub filter_model: FilterModel,
}

/// A named snapshot of column state and filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub name: String,

    #[serde(default)]
    pub column_state: Vec<ColumnState>,

    #[serde(default)]
    pub filter_model: Option<FilterModel>,

    /// When the view was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SavedView {
    pub fn capture(name: impl Into<String>, state: &GridState) -> Self {
        Self {
            name: name.into(),
            column_state: state.column_state.clone(),
            filter_model: Some(state.filter_model.clone()),
            saved_at: Some(Utc::now()),
        }
    }

    /// The state this view restores
    pub fn grid_state(&self) -> GridState {
        GridState {
            column_state: self.column_state.clone(),
            filter_model: self.filter_model.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_state_from_grid_json() {
        let state: Vec<ColumnState> = serde_json::from_value(json!([
            {"colId": "Name", "hide": false, "pinned": "left", "width": 180, "sort": "asc",
             "sortIndex": 0, "flex": null, "aggFunc": null, "rowGroup": false},
            {"colId": "Age", "pinned": null}
        ]))
        .unwrap();

        assert_eq!(state[0].pinned, Some(Pin::Left));
        assert_eq!(state[0].sort, Some(SortDirection::Asc));
        assert_eq!(state[0].width, Some(180.0));
        assert_eq!(state[1].pinned, None);
        assert_eq!(state[1].hide, None);
    }

    #[test]
    fn test_saved_view_without_filters() {
        let view: SavedView = serde_json::from_value(json!({"name": "Compact"})).unwrap();
        assert!(view.grid_state().filter_model.is_empty());
        assert!(view.saved_at.is_none());
    }
}
