//! Grid component for the data-bound grid
//!
//! Wires the window orchestrator, column layout and view state manager
//! from `dg-data` into a component that runs either in the page editor
//! (build mode) or on a live page (render mode).

pub mod column_defs;
mod grid;
mod view;

pub use column_defs::{derive_column_defs, filter_for, ColumnDef, FilterEditor, FilterParams};
pub use grid::{GridBindings, GridComponent, GridMode, GridProps};
pub use view::{GridView, GridViewId};
