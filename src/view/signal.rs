//! Threshold-based signal rule.
//!
//! A point is flagged when the short-window metric (`24h`) runs hot against
//! both the medium (`week`) and long (`month`) windows by at least a
//! configurable gap, in percentage points. Two optional extra requirements
//! tighten the rule: a positive slope of `24h` over the trailing points, and
//! `24h` above the theoretical baseline (`rtp`).

use chrono::NaiveDateTime;

use crate::domain::CanonicalRecord;

/// Tunable parameters of the rule. All adjustable from the TUI and the
/// `signals` command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalParams {
    /// Required gap, in percentage points, of `24h` over `week` and `month`.
    pub gap_pp: f64,
    /// Trailing point count for the slope requirement.
    pub slope_window: usize,
    pub require_slope: bool,
    pub require_baseline: bool,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            gap_pp: 2.0,
            slope_window: 3,
            require_slope: false,
            require_baseline: false,
        }
    }
}

/// One flagged point.
#[derive(Debug, Clone)]
pub struct SignalFlag {
    /// Index into the record slice `detect` was called with.
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub h24: f64,
    /// `24h` minus `week`.
    pub gap_week: f64,
    /// `24h` minus `month`.
    pub gap_month: f64,
    /// Trailing OLS slope of `24h`, when enough points carry a value.
    pub slope: Option<f64>,
}

/// Evaluate the rule over a windowed series (ascending by timestamp).
pub fn detect(records: &[CanonicalRecord], params: &SignalParams) -> Vec<SignalFlag> {
    let mut flags = Vec::new();

    for (index, rec) in records.iter().enumerate() {
        let (Some(h24), Some(week), Some(month)) = (rec.h24, rec.week, rec.month) else {
            continue;
        };
        if h24 < week + params.gap_pp || h24 < month + params.gap_pp {
            continue;
        }

        let slope = trailing_slope(records, index, params.slope_window);
        if params.require_slope && !slope.is_some_and(|s| s > 0.0) {
            continue;
        }
        if params.require_baseline && !rec.rtp.is_some_and(|rtp| h24 > rtp) {
            continue;
        }

        flags.push(SignalFlag {
            index,
            timestamp: rec.timestamp,
            h24,
            gap_week: h24 - week,
            gap_month: h24 - month,
            slope,
        });
    }

    flags
}

/// OLS slope of `24h` over the `window` records ending at `index`, with the
/// step position as the x axis. Records without a `24h` value are skipped;
/// fewer than two remaining points yields `None`.
fn trailing_slope(records: &[CanonicalRecord], index: usize, window: usize) -> Option<f64> {
    if window < 2 {
        return None;
    }
    let start = index.saturating_sub(window - 1);
    let points: Vec<(f64, f64)> = records[start..=index]
        .iter()
        .enumerate()
        .filter_map(|(offset, r)| r.h24.map(|v| (offset as f64, v)))
        .collect();
    ols_slope(&points)
}

fn ols_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < 1e-12 {
        return None;
    }
    Some((n * sum_xy - sum_x * sum_y) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(minute: u32, h24: f64, week: f64, month: f64) -> CanonicalRecord {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap();
        let mut r = CanonicalRecord::new(ts, "Book of X");
        r.h24 = Some(h24);
        r.week = Some(week);
        r.month = Some(month);
        r
    }

    #[test]
    fn flags_when_short_window_clears_both_gaps() {
        let records = vec![rec(0, 104.0, 100.0, 99.0)];
        let flags = detect(&records, &SignalParams::default());
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].index, 0);
        assert!((flags[0].gap_week - 4.0).abs() < 1e-12);
        assert!((flags[0].gap_month - 5.0).abs() < 1e-12);
    }

    #[test]
    fn the_gap_boundary_is_inclusive() {
        let records = vec![rec(0, 102.0, 100.0, 100.0)];
        assert_eq!(detect(&records, &SignalParams::default()).len(), 1);

        let params = SignalParams {
            gap_pp: 2.5,
            ..Default::default()
        };
        assert!(detect(&records, &params).is_empty());
    }

    #[test]
    fn missing_comparison_metrics_never_flag() {
        let mut r = rec(0, 110.0, 100.0, 100.0);
        r.month = None;
        assert!(detect(&[r], &SignalParams::default()).is_empty());
    }

    #[test]
    fn slope_requirement_needs_a_rising_short_window() {
        let rising = vec![
            rec(0, 100.0, 90.0, 90.0),
            rec(15, 102.0, 90.0, 90.0),
            rec(30, 104.0, 90.0, 90.0),
        ];
        let falling = vec![
            rec(0, 108.0, 90.0, 90.0),
            rec(15, 106.0, 90.0, 90.0),
            rec(30, 104.0, 90.0, 90.0),
        ];
        let params = SignalParams {
            require_slope: true,
            ..Default::default()
        };

        // The first point has a one-point window, so no slope and no flag.
        let flags = detect(&rising, &params);
        assert_eq!(flags.iter().map(|f| f.index).collect::<Vec<_>>(), vec![1, 2]);
        assert!(flags[1].slope.is_some_and(|s| s > 0.0));

        // The falling series clears the gap everywhere but never the slope.
        assert!(detect(&falling, &params).is_empty());
    }

    #[test]
    fn baseline_requirement_compares_against_rtp() {
        let mut above = rec(0, 104.0, 100.0, 99.0);
        above.rtp = Some(96.0);
        let mut below = rec(15, 104.0, 100.0, 99.0);
        below.rtp = Some(110.0);
        let missing = rec(30, 104.0, 100.0, 99.0);

        let params = SignalParams {
            require_baseline: true,
            ..Default::default()
        };
        let flags = detect(&[above, below, missing], &params);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].index, 0);
    }

    #[test]
    fn slope_math_is_exact_on_a_line() {
        let points: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, 3.0 + 2.0 * i as f64)).collect();
        let slope = ols_slope(&points).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);

        assert_eq!(ols_slope(&[(0.0, 1.0)]), None);
    }
}
