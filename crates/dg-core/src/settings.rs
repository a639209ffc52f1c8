//! Grid instance settings

use serde::{Deserialize, Serialize};

use crate::selection::SelectionMode;
use crate::window::RowModelConfig;

/// Where view state and saved views are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PersistenceMode {
    /// Keyed blobs in a local store
    LocalStorage,
    /// A remote state handle bound through the `state` property
    StateSource,
}

/// Settings for one grid instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridSettings {
    /// Infinite row model configuration
    pub row_model: RowModelConfig,

    pub selection_mode: SelectionMode,

    pub persistence: PersistenceMode,

    /// Columns visible in the default layout
    pub initial_visible_columns: usize,

    /// Placeholder rows shown by the build-time preview
    pub preview_rows: usize,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            row_model: RowModelConfig::default(),
            selection_mode: SelectionMode::Single,
            persistence: PersistenceMode::LocalStorage,
            initial_visible_columns: 10,
            preview_rows: 20,
        }
    }
}

impl GridSettings {
    /// Settings derived from the component's boolean properties
    pub fn from_flags(multi_selection: bool, save_local_storage: bool) -> Self {
        Self {
            selection_mode: if multi_selection {
                SelectionMode::Multiple
            } else {
                SelectionMode::Single
            },
            persistence: if save_local_storage {
                PersistenceMode::LocalStorage
            } else {
                PersistenceMode::StateSource
            },
            ..Default::default()
        }
    }
}
