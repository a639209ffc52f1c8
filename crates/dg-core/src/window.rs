//! Window requests issued by the grid's infinite row model

use serde::{Deserialize, Serialize};

use crate::entity::Row;
use crate::filter::FilterModel;
use crate::sort::SortModel;

/// One page the virtualization engine needs filled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRequest {
    pub start_row: usize,
    pub end_row: usize,
    #[serde(default)]
    pub sort_model: SortModel,
    #[serde(default)]
    pub filter_model: FilterModel,
}

impl WindowRequest {
    pub fn new(start_row: usize, end_row: usize) -> Self {
        Self {
            start_row,
            end_row,
            ..Default::default()
        }
    }

    pub fn with_sort(mut self, sort_model: SortModel) -> Self {
        self.sort_model = sort_model;
        self
    }

    pub fn with_filter(mut self, filter_model: FilterModel) -> Self {
        self.filter_model = filter_model;
        self
    }

    /// Number of rows requested
    pub fn count(&self) -> usize {
        self.end_row.saturating_sub(self.start_row)
    }

    pub fn is_filtered(&self) -> bool {
        !self.filter_model.is_empty()
    }
}

/// Outcome of a window request
#[derive(Debug, Clone, PartialEq)]
pub enum WindowResult {
    Loaded { rows: Vec<Row>, total_length: usize },
    Failed,
}

impl WindowResult {
    pub fn is_loaded(&self) -> bool {
        matches!(self, WindowResult::Loaded { .. })
    }
}

/// Success/failure callbacks handed over with every window request
pub trait WindowCallback: Send {
    fn on_success(&mut self, rows: &[Row], total_length: usize);
    fn on_failure(&mut self);
}

/// Callback that ignores both outcomes, for callers that only use the
/// returned `WindowResult`
#[derive(Debug, Default)]
pub struct NoopCallback;

impl WindowCallback for NoopCallback {
    fn on_success(&mut self, _rows: &[Row], _total_length: usize) {}
    fn on_failure(&mut self) {}
}

/// Infinite row model settings handed to the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowModelConfig {
    pub cache_block_size: usize,
    pub max_blocks_in_cache: usize,
    pub cache_overflow_size: usize,
    pub max_concurrent_datasource_requests: usize,
    pub row_buffer: usize,
}

impl Default for RowModelConfig {
    fn default() -> Self {
        Self {
            cache_block_size: 100,
            max_blocks_in_cache: 10,
            cache_overflow_size: 2,
            max_concurrent_datasource_requests: 1,
            row_buffer: 0,
        }
    }
}
