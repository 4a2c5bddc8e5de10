//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - built from messy spreadsheet cells during normalization
//! - written to / reloaded from the per-game CSV store
//! - windowed and resampled by the dashboard without conversion

use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Lower bound of the plausible percentage range.
pub const PERCENT_MIN: f64 = 0.0;

/// Upper bound of the plausible percentage range.
///
/// The tracked metrics are payout percentages that routinely sit above 100
/// (a hot 24h window can read 108%), so the bound is deliberately loose. A
/// value outside `[PERCENT_MIN, PERCENT_MAX]` is treated as a parse artifact
/// and nulled; the row itself is kept.
pub const PERCENT_MAX: f64 = 1000.0;

/// Whether a parsed value sits inside the plausible percentage range. Both
/// the normalizer and the store apply this, so out-of-range values cannot
/// enter a series from either side.
pub fn in_percent_range(v: f64) -> bool {
    (PERCENT_MIN..=PERCENT_MAX).contains(&v)
}

/// The four tracked metrics, in canonical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    H24,
    Week,
    Month,
    Rtp,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::H24,
        MetricKind::Week,
        MetricKind::Month,
        MetricKind::Rtp,
    ];

    /// Canonical lowercase label, as used in CSV headers and embedded in
    /// cell text (`"24H108.03%"` anchors on `"24h"`).
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::H24 => "24h",
            MetricKind::Week => "week",
            MetricKind::Month => "month",
            MetricKind::Rtp => "rtp",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            MetricKind::H24 => "24H",
            MetricKind::Week => "Week",
            MetricKind::Month => "Month",
            MetricKind::Rtp => "RTP",
        }
    }

    pub fn next(self) -> Self {
        match self {
            MetricKind::H24 => MetricKind::Week,
            MetricKind::Week => MetricKind::Month,
            MetricKind::Month => MetricKind::Rtp,
            MetricKind::Rtp => MetricKind::H24,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            MetricKind::H24 => MetricKind::Rtp,
            MetricKind::Week => MetricKind::H24,
            MetricKind::Month => MetricKind::Week,
            MetricKind::Rtp => MetricKind::Month,
        }
    }
}

/// One normalized observation for one game at one point in time.
///
/// Invariants enforced by the normalizer (not by construction):
/// - `game` is non-empty
/// - at least one metric is non-null
/// - every non-null metric sits inside `[PERCENT_MIN, PERCENT_MAX]`
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// Naive wall-clock timestamp. The source sheets carry no zone info, so
    /// the value is kept exactly as observed and written back as ISO-8601.
    pub timestamp: NaiveDateTime,
    pub game: String,
    pub h24: Option<f64>,
    pub week: Option<f64>,
    pub month: Option<f64>,
    pub rtp: Option<f64>,
}

impl CanonicalRecord {
    pub fn new(timestamp: NaiveDateTime, game: impl Into<String>) -> Self {
        Self {
            timestamp,
            game: game.into(),
            h24: None,
            week: None,
            month: None,
            rtp: None,
        }
    }

    pub fn metric(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::H24 => self.h24,
            MetricKind::Week => self.week,
            MetricKind::Month => self.month,
            MetricKind::Rtp => self.rtp,
        }
    }

    pub fn set_metric(&mut self, kind: MetricKind, value: Option<f64>) {
        match kind {
            MetricKind::H24 => self.h24 = value,
            MetricKind::Week => self.week = value,
            MetricKind::Month => self.month = value,
            MetricKind::Rtp => self.rtp = value,
        }
    }

    /// True if any of the four metrics is non-null.
    pub fn has_any_metric(&self) -> bool {
        MetricKind::ALL.iter().any(|&k| self.metric(k).is_some())
    }
}

/// One spreadsheet cell after type-mapping, before any interpretation.
///
/// Excel cells arrive typed, CSV cells arrive as text; both are folded into
/// this enum so the extraction layer has a single surface to work on.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Empty,
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }
}

/// One raw table read from one source file.
///
/// No schema is guaranteed at this point: headers may be synonyms,
/// placeholders (`Text`, `Text1`, ...) or may even carry the values
/// themselves.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Name of the file this table was read from.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

/// Why a whole file produced zero usable records.
///
/// These are expected operational outcomes, not errors: the file is counted
/// in the run report and skipped, and the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoTimestampColumn,
    NoMetricColumns,
    NoUsableMetricValues,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::NoTimestampColumn => "no timestamp column",
            SkipReason::NoMetricColumns => "no metric columns",
            SkipReason::NoUsableMetricValues => "no usable metric values",
        };
        write!(f, "{s}")
    }
}

/// A full `collect` run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Drive folder id, or a folder URL to extract the id from.
    pub folder: String,
    /// Local mirror of the remote folder. Wiped at the start of each run
    /// unless `keep_raw` is set.
    pub raw_dir: PathBuf,
    /// Per-game CSV store directory.
    pub data_dir: PathBuf,
    pub keep_raw: bool,
    /// Per-request timeout in seconds. There is no retry anywhere: a failed
    /// request skips that file and the next scheduled run catches up.
    pub timeout_secs: u64,
}

/// Configuration for a local-only `normalize` run.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Directory of already-downloaded spreadsheets, searched recursively.
    pub raw_dir: PathBuf,
    pub data_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn metric_accessors_round_trip() {
        let mut rec = CanonicalRecord::new(ts(), "Book of X");
        assert!(!rec.has_any_metric());

        for (i, kind) in MetricKind::ALL.into_iter().enumerate() {
            rec.set_metric(kind, Some(90.0 + i as f64));
        }
        assert_eq!(rec.metric(MetricKind::H24), Some(90.0));
        assert_eq!(rec.metric(MetricKind::Rtp), Some(93.0));
        assert!(rec.has_any_metric());
    }

    #[test]
    fn metric_cycle_covers_all_kinds() {
        let mut kind = MetricKind::H24;
        for _ in 0..4 {
            kind = kind.next();
        }
        assert_eq!(kind, MetricKind::H24);
        assert_eq!(MetricKind::H24.prev(), MetricKind::Rtp);
    }

    #[test]
    fn percent_range_is_inclusive() {
        assert!(in_percent_range(0.0));
        assert!(in_percent_range(108.03));
        assert!(in_percent_range(1000.0));
        assert!(!in_percent_range(-0.1));
        assert!(!in_percent_range(1000.1));
    }

    #[test]
    fn skip_reason_messages_are_stable() {
        assert_eq!(
            SkipReason::NoTimestampColumn.to_string(),
            "no timestamp column"
        );
        assert_eq!(SkipReason::NoMetricColumns.to_string(), "no metric columns");
        assert_eq!(
            SkipReason::NoUsableMetricValues.to_string(),
            "no usable metric values"
        );
    }
}
