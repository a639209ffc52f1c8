//! Core types for the data-bound grid
//!
//! This crate provides the column, filter, sort and window models shared by
//! the bridge and the component, together with the backend traits the host
//! platform implements.

pub mod column;
pub mod data;
pub mod entity;
pub mod events;
pub mod filter;
pub mod selection;
pub mod settings;
pub mod sort;
pub mod window;

// Re-export commonly used types
pub use column::{AttributeKind, ColumnDataType, ColumnDescriptor};
pub use data::{AttributeInfo, Dataclass, DataclassCatalog, Datasource, QueryScope, RowSource};
pub use entity::{Entity, Row};
pub use events::EventBus;
pub use filter::{
    ColumnFilter, DateOperator, FilterCondition, FilterModel, LogicalOperator, NumberOperator,
    TextOperator,
};
pub use selection::{CurrentElement, ElementCursor, SelectionMode, SelectionTracker};
pub use settings::{GridSettings, PersistenceMode};
pub use sort::{SortDirection, SortModel, SortModelItem};
pub use window::{RowModelConfig, WindowCallback, WindowRequest, WindowResult};
