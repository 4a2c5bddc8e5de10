//! Raw table → canonical records.
//!
//! Two shapes occur in the wild:
//!
//! - **Row tables**: a header row plus data rows, one observation per row.
//! - **Header-embedded tables**: a single header row that carries the values
//!   itself (`"24H108.03%"` as a header, zero data rows). These synthesize
//!   exactly one record.
//!
//! A file that yields no usable records is a skip, never a failure: the
//! caller logs the typed reason and moves on.

use chrono::NaiveDateTime;

use crate::domain::{
    in_percent_range, CanonicalRecord, MetricKind, RawCell, RawTable, SkipReason,
};
use crate::extract::{columns, metric, time};

/// Outcome of normalizing one file.
#[derive(Debug, Clone)]
pub struct NormalizedFile {
    pub records: Vec<CanonicalRecord>,
    pub rows_read: usize,
    /// Rows without a parseable timestamp, a game name, or any usable metric.
    pub rows_dropped: usize,
    pub header_embedded: bool,
}

/// Normalize one raw table.
///
/// `fallback_game` (normally the file stem) fills in when no game column
/// resolves or a row's game cell is blank. `collected_at` stamps
/// header-embedded tables that carry no timestamp of their own.
pub fn normalize_table(
    table: &RawTable,
    fallback_game: &str,
    collected_at: NaiveDateTime,
) -> Result<NormalizedFile, SkipReason> {
    if table.rows.is_empty() {
        return synthesize_from_headers(table, fallback_game, collected_at);
    }

    let cols = columns::resolve(&table.headers, &table.rows);
    let Some(ts_idx) = cols.timestamp else {
        return Err(SkipReason::NoTimestampColumn);
    };
    if !cols.has_metrics() {
        return Err(SkipReason::NoMetricColumns);
    }

    let mut records = Vec::new();
    for row in &table.rows {
        let Some(timestamp) = row.get(ts_idx).and_then(time::datetime_from_cell) else {
            continue;
        };

        let game = cols
            .game
            .and_then(|i| row.get(i))
            .and_then(game_from_cell)
            .unwrap_or_else(|| fallback_game.trim().to_string());
        if game.is_empty() {
            continue;
        }

        let mut rec = CanonicalRecord::new(timestamp, game);
        for kind in MetricKind::ALL {
            let value = cols
                .metric(kind)
                .and_then(|i| row.get(i))
                .and_then(|cell| metric::metric_from_cell(cell, kind))
                .filter(|v| in_percent_range(*v));
            rec.set_metric(kind, value);
        }
        if !rec.has_any_metric() {
            continue;
        }
        records.push(rec);
    }

    if records.is_empty() {
        return Err(SkipReason::NoUsableMetricValues);
    }

    let rows_read = table.rows.len();
    let rows_dropped = rows_read - records.len();
    Ok(NormalizedFile {
        records,
        rows_read,
        rows_dropped,
        header_embedded: false,
    })
}

/// Build the single record of a header-embedded table.
///
/// Metric extraction here is label-anchored only: the headers also hold the
/// game name and possibly a timestamp, and a bare-number fallback would read
/// digits out of those.
fn synthesize_from_headers(
    table: &RawTable,
    fallback_game: &str,
    collected_at: NaiveDateTime,
) -> Result<NormalizedFile, SkipReason> {
    // The wall-clock fallback carries nanoseconds; floor it like every other
    // timestamp source.
    let timestamp = table
        .headers
        .iter()
        .find_map(|h| time::parse_datetime(h))
        .unwrap_or_else(|| time::truncate_subsec(collected_at));

    let game = table
        .headers
        .first()
        .map(|s| s.trim())
        .filter(|s| !is_placeholder_name(s))
        .map(str::to_string)
        .unwrap_or_else(|| fallback_game.trim().to_string());
    let game = if game.is_empty() { "unnamed".to_string() } else { game };

    let mut rec = CanonicalRecord::new(timestamp, game);
    for kind in MetricKind::ALL {
        let value = table
            .headers
            .iter()
            .find_map(|h| metric::extract_labeled(h, kind))
            .filter(|v| in_percent_range(*v));
        rec.set_metric(kind, value);
    }
    if !rec.has_any_metric() {
        return Err(SkipReason::NoUsableMetricValues);
    }

    Ok(NormalizedFile {
        records: vec![rec],
        rows_read: 0,
        rows_dropped: 0,
        header_embedded: true,
    })
}

/// Spreadsheet exports name fillers `Text`/`Text1`/`Unnamed: 0`; none of
/// those is a real game name.
fn is_placeholder_name(name: &str) -> bool {
    let n = name.trim().to_lowercase();
    if n.is_empty() || n.starts_with("unnamed") {
        return true;
    }
    match n.strip_prefix("text") {
        Some(rest) => rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

fn game_from_cell(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Text(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        RawCell::Number(v) => Some(v.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn text_row(cells: &[&str]) -> Vec<RawCell> {
        cells.iter().map(|s| RawCell::Text(s.to_string())).collect()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn table(headers_: Vec<String>, rows: Vec<Vec<RawCell>>) -> RawTable {
        RawTable {
            source: "sheet.xlsx".to_string(),
            headers: headers_,
            rows,
        }
    }

    #[test]
    fn placeholder_columns_normalize_to_one_record() {
        let t = table(
            headers(&["Text", "Text1", "Text2", "Text3", "Text4", "Current_time"]),
            vec![text_row(&[
                "Book of X",
                "24H96.7%",
                "Week104.1%",
                "Month80.2%",
                "RTP95.0%",
                "2024-01-01 10:00:00",
            ])],
        );
        let out = normalize_table(&t, "sheet", at(23, 59)).unwrap();
        assert_eq!(out.rows_read, 1);
        assert_eq!(out.rows_dropped, 0);
        assert!(!out.header_embedded);

        let rec = &out.records[0];
        assert_eq!(rec.timestamp, at(10, 0));
        assert_eq!(rec.game, "Book of X");
        assert_eq!(rec.h24, Some(96.7));
        assert_eq!(rec.week, Some(104.1));
        assert_eq!(rec.month, Some(80.2));
        assert_eq!(rec.rtp, Some(95.0));
    }

    #[test]
    fn numeric_cells_pass_through() {
        let t = table(
            headers(&["game", "24h", "timestamp"]),
            vec![vec![
                RawCell::Text("Book of X".into()),
                RawCell::Number(96.7),
                RawCell::DateTime(at(10, 0)),
            ]],
        );
        let out = normalize_table(&t, "sheet", at(0, 0)).unwrap();
        assert_eq!(out.records[0].h24, Some(96.7));
    }

    #[test]
    fn out_of_range_values_are_nulled_but_the_row_survives() {
        let t = table(
            headers(&["game", "24h", "week", "timestamp"]),
            vec![text_row(&[
                "Book of X",
                "24H2000%",
                "Week104.1%",
                "2024-01-01 10:00:00",
            ])],
        );
        let out = normalize_table(&t, "sheet", at(0, 0)).unwrap();
        let rec = &out.records[0];
        assert_eq!(rec.h24, None);
        assert_eq!(rec.week, Some(104.1));
    }

    #[test]
    fn rows_without_timestamp_are_dropped_and_counted() {
        let t = table(
            headers(&["game", "24h", "timestamp"]),
            vec![
                text_row(&["Book of X", "24H96.7%", "not a date"]),
                text_row(&["Book of X", "24H97.0%", "2024-01-01 10:15:00"]),
            ],
        );
        let out = normalize_table(&t, "sheet", at(0, 0)).unwrap();
        assert_eq!(out.rows_read, 2);
        assert_eq!(out.rows_dropped, 1);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].h24, Some(97.0));
    }

    #[test]
    fn blank_game_cells_fall_back_to_the_file_stem() {
        let t = table(
            headers(&["game", "24h", "timestamp"]),
            vec![text_row(&["  ", "24H96.7%", "2024-01-01 10:00:00"])],
        );
        let out = normalize_table(&t, "sweet-bonanza", at(0, 0)).unwrap();
        assert_eq!(out.records[0].game, "sweet-bonanza");
    }

    #[test]
    fn skip_reasons_cover_the_three_failure_shapes() {
        // Metrics but no timestamp signal anywhere.
        let t = table(
            headers(&["game", "24h"]),
            vec![text_row(&["Book of X", "24H96.7%"])],
        );
        assert_eq!(
            normalize_table(&t, "s", at(0, 0)).unwrap_err(),
            SkipReason::NoTimestampColumn
        );

        // Timestamp but no metric columns.
        let t = table(
            headers(&["Oyun", "Tarih"]),
            vec![text_row(&["Book of X", "2024-01-01 10:00:00"])],
        );
        assert_eq!(
            normalize_table(&t, "s", at(0, 0)).unwrap_err(),
            SkipReason::NoMetricColumns
        );

        // Columns resolve, but every value is junk.
        let t = table(
            headers(&["game", "24h", "timestamp"]),
            vec![text_row(&["Book of X", "n/a", "2024-01-01 10:00:00"])],
        );
        assert_eq!(
            normalize_table(&t, "s", at(0, 0)).unwrap_err(),
            SkipReason::NoUsableMetricValues
        );
    }

    #[test]
    fn header_embedded_table_synthesizes_one_record() {
        let t = table(
            headers(&["Book of X", "24H96.7%", "Week104,12%", "2024-01-01 10:00"]),
            vec![],
        );
        let out = normalize_table(&t, "sheet", at(23, 0)).unwrap();
        assert!(out.header_embedded);
        let rec = &out.records[0];
        assert_eq!(rec.game, "Book of X");
        assert_eq!(rec.timestamp, at(10, 0));
        assert_eq!(rec.h24, Some(96.7));
        assert_eq!(rec.week, Some(104.12));
        assert_eq!(rec.month, None);
    }

    #[test]
    fn header_embedded_placeholder_name_uses_the_file_stem() {
        let t = table(headers(&["Text", "RTP96.07%"]), vec![]);
        let out = normalize_table(&t, "gates-of-y", at(12, 30)).unwrap();
        let rec = &out.records[0];
        assert_eq!(rec.game, "gates-of-y");
        // No timestamp header: the collection time stamps the record.
        assert_eq!(rec.timestamp, at(12, 30));
        assert_eq!(rec.rtp, Some(96.07));
    }

    #[test]
    fn header_embedded_collection_time_is_floored_to_seconds() {
        use chrono::Timelike;

        let t = table(headers(&["Text", "RTP96.07%"]), vec![]);
        let fractional = at(12, 30).with_nanosecond(123_456_789).unwrap();
        let out = normalize_table(&t, "gates-of-y", fractional).unwrap();
        assert_eq!(out.records[0].timestamp, at(12, 30));
    }

    #[test]
    fn header_embedded_without_metrics_is_a_skip() {
        let t = table(headers(&["Book of X", "hello"]), vec![]);
        assert_eq!(
            normalize_table(&t, "s", at(0, 0)).unwrap_err(),
            SkipReason::NoUsableMetricValues
        );
    }

    #[test]
    fn placeholder_names() {
        assert!(is_placeholder_name("Text"));
        assert!(is_placeholder_name("text3"));
        assert!(is_placeholder_name("Unnamed: 0"));
        assert!(is_placeholder_name("  "));
        assert!(!is_placeholder_name("Book of X"));
        assert!(!is_placeholder_name("textual"));
    }
}
