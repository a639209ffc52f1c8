//! Reference backends: an in-memory dataclass and a CSV loader

pub mod csv_source;
pub mod memory;
pub mod predicate;

pub use csv_source::load_csv;
pub use memory::{MemoryDataclass, MemoryDatasource, MemoryResultSet};
pub use predicate::{parse as parse_predicate, Predicate};
