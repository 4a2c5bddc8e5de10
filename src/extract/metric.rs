//! Label-anchored metric extraction.
//!
//! Source cells mix the metric label and its value into one string
//! (`"24H108.03%"`, `"Week104,12%"`), sometimes with spaces, sometimes with a
//! comma decimal separator. This module turns such strings into floats.
//!
//! Design goals:
//! - **Label first**: the number immediately after the (case-insensitive)
//!   label wins, so digits inside the label (`24h`) are never mis-read.
//! - **Explicit fallback**: when the label is absent, take the *last* numeric
//!   token anywhere in the string. One policy, stated here, tested below.
//! - **Loose number format**: comma or dot decimals, optional sign, optional
//!   trailing `%`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{MetricKind, RawCell};

static H24_AFTER_LABEL: Lazy<Regex> = Lazy::new(|| label_value_pattern(MetricKind::H24.label()));
static WEEK_AFTER_LABEL: Lazy<Regex> = Lazy::new(|| label_value_pattern(MetricKind::Week.label()));
static MONTH_AFTER_LABEL: Lazy<Regex> =
    Lazy::new(|| label_value_pattern(MetricKind::Month.label()));
static RTP_AFTER_LABEL: Lazy<Regex> = Lazy::new(|| label_value_pattern(MetricKind::Rtp.label()));

static NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+-]?\d+(?:[.,]\d+)?").unwrap());

fn label_value_pattern(label: &str) -> Regex {
    // Optional whitespace between label and value; comma or dot decimals.
    Regex::new(&format!(r"(?i){label}\s*([+-]?\d+(?:[.,]\d+)?)")).unwrap()
}

fn after_label_pattern(kind: MetricKind) -> &'static Regex {
    match kind {
        MetricKind::H24 => &H24_AFTER_LABEL,
        MetricKind::Week => &WEEK_AFTER_LABEL,
        MetricKind::Month => &MONTH_AFTER_LABEL,
        MetricKind::Rtp => &RTP_AFTER_LABEL,
    }
}

/// Parse a number in the loose cell format: trimmed, optional trailing `%`,
/// comma accepted as the decimal separator.
pub fn parse_loose_number(s: &str) -> Option<f64> {
    let s = s.trim().trim_end_matches('%').trim();
    if s.is_empty() {
        return None;
    }
    let v = s.replace(',', ".").parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// The number immediately after the metric label, or `None` when the label
/// does not occur in `value`. No fallback; used where surrounding text may
/// contain unrelated digits (header-embedded tables).
pub fn extract_labeled(value: &str, kind: MetricKind) -> Option<f64> {
    let caps = after_label_pattern(kind).captures(value)?;
    parse_loose_number(caps.get(1)?.as_str())
}

/// Full extraction contract for a metric cell: label-anchored first, then the
/// last numeric token anywhere in the string, `None` when the string holds no
/// number at all.
pub fn extract_after_label(value: &str, kind: MetricKind) -> Option<f64> {
    if let Some(v) = extract_labeled(value, kind) {
        return Some(v);
    }
    NUMBER_TOKEN
        .find_iter(value)
        .last()
        .and_then(|m| parse_loose_number(m.as_str()))
}

/// Metric value of one resolved cell. Numeric cells bypass the string path.
pub fn metric_from_cell(cell: &RawCell, kind: MetricKind) -> Option<f64> {
    match cell {
        RawCell::Number(v) if v.is_finite() => Some(*v),
        RawCell::Text(s) => extract_after_label(s, kind),
        _ => None,
    }
}
