//! External data sources.
//!
//! - Google Drive listing/download (`drive`)
//! - spreadsheet/CSV file reading (`sheet`)

pub mod drive;
pub mod sheet;

pub use drive::*;
pub use sheet::*;
