//! Heuristic column resolution.
//!
//! Source tables name their columns three ways: natural names (`24H`,
//! `Week`), localized synonyms (`24 Saat`, `Hafta`, `Tarih`) or generic
//! placeholders (`Text`, `Text1`, ...). Resolution runs in priority order:
//!
//! 1. exact match of the normalized header against the alias table
//! 2. timestamp only: content sniffing over the first few columns
//! 3. positional fallback (column 0 = game, 1..=4 = metrics) when the
//!    headers carry no game/metric signal at all
//!
//! Resolution never fails. It returns a partial map and the caller decides
//! whether the file is usable.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::domain::{MetricKind, RawCell};
use crate::extract::time;

/// How many leading columns are candidates for timestamp sniffing.
pub const SNIFF_COLUMNS: usize = 6;

/// Minimum fraction of a column's non-empty cells that must parse as a
/// datetime for sniffing to accept it.
pub const MIN_SNIFF_RATIO: f64 = 0.3;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Game,
    Timestamp,
    Metric(MetricKind),
}

static HEADER_ALIASES: Lazy<HashMap<&'static str, Field>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for alias in ["game", "oyun", "text", "name"] {
        m.insert(alias, Field::Game);
    }
    for alias in [
        "timestamp",
        "current_time",
        "time",
        "datetime",
        "date",
        "tarih",
        "zaman",
    ] {
        m.insert(alias, Field::Timestamp);
    }
    for alias in ["24h", "24 saat", "text1"] {
        m.insert(alias, Field::Metric(MetricKind::H24));
    }
    for alias in ["week", "hafta", "1w", "text2"] {
        m.insert(alias, Field::Metric(MetricKind::Week));
    }
    for alias in ["month", "ay", "1m", "text3"] {
        m.insert(alias, Field::Metric(MetricKind::Month));
    }
    for alias in ["rtp", "text4"] {
        m.insert(alias, Field::Metric(MetricKind::Rtp));
    }
    m
});

/// Resolved column indices, any of which may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub game: Option<usize>,
    pub timestamp: Option<usize>,
    metrics: [Option<usize>; 4],
}

fn metric_slot(kind: MetricKind) -> usize {
    match kind {
        MetricKind::H24 => 0,
        MetricKind::Week => 1,
        MetricKind::Month => 2,
        MetricKind::Rtp => 3,
    }
}

impl ColumnMap {
    pub fn metric(&self, kind: MetricKind) -> Option<usize> {
        self.metrics[metric_slot(kind)]
    }

    fn set_metric(&mut self, kind: MetricKind, idx: usize) {
        self.metrics[metric_slot(kind)] = Some(idx);
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.iter().filter(|m| m.is_some()).count()
    }

    pub fn has_metrics(&self) -> bool {
        self.metric_count() > 0
    }

    fn is_assigned(&self, idx: usize) -> bool {
        self.game == Some(idx)
            || self.timestamp == Some(idx)
            || self.metrics.contains(&Some(idx))
    }
}

/// Normalize a header for alias lookup.
///
/// Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
/// first header; without stripping it the alias lookup silently misses.
/// Unicode lowercasing because several aliases are Turkish.
fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

/// Resolve headers to canonical fields. `rows` is only consulted for
/// timestamp sniffing.
pub fn resolve(headers: &[String], rows: &[Vec<RawCell>]) -> ColumnMap {
    let mut map = ColumnMap::default();
    let mut name_hits = 0usize;

    for (idx, header) in headers.iter().enumerate() {
        let normalized = normalize_header(header);
        match HEADER_ALIASES.get(normalized.as_str()) {
            Some(Field::Game) => {
                if map.game.is_none() {
                    map.game = Some(idx);
                    name_hits += 1;
                }
            }
            Some(Field::Timestamp) => {
                if map.timestamp.is_none() {
                    map.timestamp = Some(idx);
                }
            }
            Some(Field::Metric(kind)) => {
                if map.metric(*kind).is_none() {
                    map.set_metric(*kind, idx);
                    name_hits += 1;
                }
            }
            None => {}
        }
    }

    if map.timestamp.is_none() {
        map.timestamp = sniff_timestamp(rows, headers.len(), &map);
    }

    // Positional fallback only when the headers gave no game/metric signal;
    // a timestamp hit alone (by alias or sniff) does not count as signal.
    if name_hits == 0 {
        let positions: Vec<usize> =
            (0..headers.len()).filter(|&i| map.timestamp != Some(i)).collect();
        if let Some(&game_idx) = positions.first() {
            map.game = Some(game_idx);
        }
        for (offset, kind) in MetricKind::ALL.into_iter().enumerate() {
            if let Some(&idx) = positions.get(1 + offset) {
                map.set_metric(kind, idx);
            }
        }
    }

    map
}

/// Pick the leading column whose cells most often parse as datetimes.
fn sniff_timestamp(rows: &[Vec<RawCell>], width: usize, taken: &ColumnMap) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for col in 0..width.min(SNIFF_COLUMNS) {
        if taken.is_assigned(col) {
            continue;
        }

        let mut non_empty = 0usize;
        let mut parsed = 0usize;
        for row in rows {
            let Some(cell) = row.get(col) else { continue };
            if cell.is_empty() {
                continue;
            }
            non_empty += 1;
            if time::datetime_from_cell(cell).is_some() {
                parsed += 1;
            }
        }
        if non_empty == 0 {
            continue;
        }

        let ratio = parsed as f64 / non_empty as f64;
        if ratio >= MIN_SNIFF_RATIO && best.is_none_or(|(_, r)| ratio > r) {
            best = Some((col, ratio));
        }
    }

    best.map(|(col, _)| col)
}
