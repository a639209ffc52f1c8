//! Translation of grid filter and sort models into backend query language

pub mod filter;
pub mod sort;

pub use filter::{compile_clauses, compile_condition, compile_filter, format_date, CompiledClause};
pub use sort::{order_by_expression, SortCompiler};
