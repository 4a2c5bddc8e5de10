//! Timestamp parsing for spreadsheet cells.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};

use crate::domain::RawCell;

/// Drop subsecond precision.
///
/// Series files key on whole seconds, so every timestamp entering the
/// pipeline is floored here first; otherwise a fractional record would sit
/// beside its truncated stored twin after a re-run.
pub fn truncate_subsec(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Parse a cell's text as a datetime.
///
/// The store writes ISO-8601, but source sheets arrive in whatever the
/// exporting tool produced. We accept a small fixed set of formats (including
/// the Turkish-locale `DD.MM.YYYY`) to keep parsing deterministic; date-only
/// values resolve to midnight and subsecond fractions are dropped.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(truncate_subsec(dt.naive_utc()));
    }

    const FMTS: [&str; 8] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
        "%d/%m/%Y %H:%M:%S",
    ];
    for fmt in FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(truncate_subsec(dt));
        }
    }

    const DATE_FMTS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Timestamp value of one cell: native datetime cells pass through, text is
/// parsed, numbers are not interpreted (a bare float is not a date we trust).
/// Excel date cells carry millisecond precision; those fractions are dropped
/// like everywhere else.
pub fn datetime_from_cell(cell: &RawCell) -> Option<NaiveDateTime> {
    match cell {
        RawCell::DateTime(dt) => Some(truncate_subsec(*dt)),
        RawCell::Text(s) => parse_datetime(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn iso_and_space_separated_forms() {
        assert_eq!(
            parse_datetime("2024-01-01T10:00:00"),
            Some(expect(2024, 1, 1, 10, 0, 0))
        );
        assert_eq!(
            parse_datetime("2024-01-01 10:00:00"),
            Some(expect(2024, 1, 1, 10, 0, 0))
        );
        assert_eq!(
            parse_datetime("2024-01-01 10:00"),
            Some(expect(2024, 1, 1, 10, 0, 0))
        );
    }

    #[test]
    fn rfc3339_with_zone_is_normalized_to_utc() {
        assert_eq!(
            parse_datetime("2024-01-01T12:00:00+02:00"),
            Some(expect(2024, 1, 1, 10, 0, 0))
        );
    }

    #[test]
    fn turkish_locale_day_first() {
        assert_eq!(
            parse_datetime("01.02.2024 09:30"),
            Some(expect(2024, 2, 1, 9, 30, 0))
        );
        assert_eq!(parse_datetime("01.02.2024"), Some(expect(2024, 2, 1, 0, 0, 0)));
    }

    #[test]
    fn date_only_is_midnight() {
        assert_eq!(parse_datetime("2024-03-05"), Some(expect(2024, 3, 5, 0, 0, 0)));
    }

    #[test]
    fn subsecond_precision_is_dropped() {
        assert_eq!(
            parse_datetime("2024-01-01 10:00:00.500"),
            Some(expect(2024, 1, 1, 10, 0, 0))
        );
        assert_eq!(
            parse_datetime("2024-01-01T10:00:00.250+00:00"),
            Some(expect(2024, 1, 1, 10, 0, 0))
        );

        let fractional = expect(2024, 1, 1, 10, 0, 0).with_nanosecond(500_000_000).unwrap();
        assert_eq!(
            datetime_from_cell(&RawCell::DateTime(fractional)),
            Some(expect(2024, 1, 1, 10, 0, 0))
        );
    }

    #[test]
    fn junk_is_none() {
        assert_eq!(parse_datetime("Book of X"), None);
        assert_eq!(parse_datetime("96.07"), None);
        assert_eq!(parse_datetime(""), None);
    }

    #[test]
    fn cells_only_trust_text_and_native_datetimes() {
        let dt = expect(2024, 1, 1, 10, 0, 0);
        assert_eq!(datetime_from_cell(&RawCell::DateTime(dt)), Some(dt));
        assert_eq!(
            datetime_from_cell(&RawCell::Text("2024-01-01 10:00:00".into())),
            Some(dt)
        );
        assert_eq!(datetime_from_cell(&RawCell::Number(45_000.0)), None);
        assert_eq!(datetime_from_cell(&RawCell::Empty), None);
    }
}
