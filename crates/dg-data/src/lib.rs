//! Data bridge between the grid's window requests and the host backend

pub mod catalog;
pub mod fetch;
pub mod layout;
pub mod orchestrator;
pub mod persist;
pub mod query;
pub mod reconcile;
pub mod session;
pub mod sources;

use thiserror::Error;

// Re-exports
pub use catalog::{flatten_attributes, normalize_columns, resolve_dataclass, DatasourceRef};
pub use fetch::{fetch_window, project_entity, PageWindow};
pub use layout::ColumnLayout;
pub use orchestrator::WindowOrchestrator;
pub use persist::{BlobStore, ColumnState, GridState, SavedView, StateStore, ViewStateManager};
pub use query::{compile_filter, order_by_expression, SortCompiler};
pub use reconcile::reconcile_selection;
pub use session::ScopedQuerySession;
pub use sources::{load_csv, MemoryDataclass, MemoryDatasource};

/// Errors that can occur in grid data operations
#[derive(Error, Debug)]
pub enum GridError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid window: end row {end} is not after start row {start}")]
    InvalidWindow { start: usize, end: usize },

    #[error("Query error: {0}")]
    Query(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Unknown view: {0}")]
    UnknownView(String),
}

impl From<csv::Error> for GridError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => GridError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => GridError::Csv(error.to_string()),
        }
    }
}
