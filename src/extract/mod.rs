//! Extraction and normalization of semi-structured spreadsheet data.
//!
//! This is the core of the tool. Everything else (Drive client, store, TUI)
//! is plumbing around three steps:
//!
//! - `metric`: pull a percentage out of a label+value cell (`"24H108.03%"`)
//! - `columns`: resolve loosely-named headers to the canonical schema
//! - `table`: turn one raw table into zero or more canonical records

pub mod columns;
pub mod metric;
pub mod table;
pub mod time;

pub use columns::{resolve, ColumnMap};
pub use table::{normalize_table, NormalizedFile};
