//! Reading downloaded files into raw tables.
//!
//! xlsx/xls go through calamine (first worksheet, typed cells); csv goes
//! through the csv crate with every cell as text. Either way the result is
//! the same schema-free `RawTable` the extraction layer works on.

use std::fs::File;
use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};

use crate::domain::{RawCell, RawTable};

/// Whether this looks like a file we can read at all.
pub fn is_supported(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("xlsx" | "xls" | "csv"))
}

/// File stem, used as the game-name fallback for schema-less tables.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

/// Read one file into a raw table. The error string becomes the per-file
/// outcome in the run report; it never fails the run.
pub fn read_table(path: &Path) -> Result<RawTable, String> {
    match extension(path).as_deref() {
        Some("xlsx") | Some("xls") => read_workbook(path),
        Some("csv") => read_csv(path),
        _ => Err("unsupported file type".to_string()),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("<unnamed>")
        .to_string()
}

fn read_workbook(path: &Path) -> Result<RawTable, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| format!("cannot open workbook: {e}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no worksheets".to_string())?
        .map_err(|e| format!("cannot read first worksheet: {e}"))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(header_text).collect(),
        None => Vec::new(),
    };
    let rows: Vec<Vec<RawCell>> = rows.map(|row| row.iter().map(map_cell).collect()).collect();

    Ok(RawTable {
        source: source_name(path),
        headers,
        rows,
    })
}

fn read_csv(path: &Path) -> Result<RawTable, String> {
    let file = File::open(path).map_err(|e| format!("cannot open file: {e}"))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("cannot read header row: {e}"))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| format!("cannot read row: {e}"))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let field = field.trim();
                    if field.is_empty() {
                        RawCell::Empty
                    } else {
                        RawCell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable {
        source: source_name(path),
        headers,
        rows,
    })
}

/// Map one Excel cell. Only cells Excel itself typed as dates become
/// `DateTime`; a plain float is never reinterpreted as a date serial.
fn map_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) | Data::Bool(_) => RawCell::Empty,
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                RawCell::Empty
            } else {
                RawCell::Text(s.to_string())
            }
        }
        Data::Float(v) => RawCell::Number(*v),
        Data::Int(v) => RawCell::Number(*v as f64),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => RawCell::DateTime(dt),
            None => RawCell::Empty,
        },
        Data::DurationIso(s) => RawCell::Text(s.clone()),
    }
}

/// Render one header cell as text. Date-typed header cells print in a form
/// the timestamp parser reads back, so header-embedded timestamps survive.
fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}
