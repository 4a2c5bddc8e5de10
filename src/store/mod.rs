//! Per-game CSV store.
//!
//! One file per game under the data directory, named by a filesystem-safe
//! slug of the game name. Files are small (one row per collector run), so
//! every merge loads, merges in memory, and rewrites the whole file.
//!
//! Design goals:
//! - **Append-only semantics**: a merge never loses an existing timestamp.
//! - **Newest wins**: on duplicate timestamps the incoming snapshot replaces
//!   the stored record.
//! - **Tolerant reads**: a missing or corrupt file is treated as empty with a
//!   warning; a bad row is skipped, not fatal.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::warn;

use crate::domain::{in_percent_range, CanonicalRecord, MetricKind};
use crate::error::AppError;
use crate::extract::{columns, metric, time};

pub const SERIES_HEADER: [&str; 6] = ["timestamp", "game", "24h", "week", "month", "rtp"];

const TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Filesystem-safe slug of a game name: lowercased, ASCII alphanumerics
/// kept, every other run of characters collapsed to a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() { "unnamed".to_string() } else { slug }
}

/// Store path for one game (accepts a raw name or an existing slug; slugs
/// pass through unchanged).
pub fn entity_path(dir: &Path, game: &str) -> PathBuf {
    dir.join(format!("{}.csv", slugify(game)))
}

/// Read one series file. Missing, unreadable or malformed content degrades
/// to an empty (or partial) result with a warning; this function never fails
/// the run.
pub fn read_series(path: &Path) -> Vec<CanonicalRecord> {
    if !path.exists() {
        return Vec::new();
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("{}: cannot open, treating as empty: {e}", path.display());
            return Vec::new();
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(str::to_string).collect(),
        Err(e) => {
            warn!("{}: unreadable header, treating as empty: {e}", path.display());
            return Vec::new();
        }
    };

    // Same alias table as source-file resolution, so locale-variant store
    // headers (`24H,Week,...`, `Hafta`, `Tarih`) read back fine.
    let cols = columns::resolve(&headers, &[]);
    let Some(ts_idx) = cols.timestamp else {
        warn!("{}: no timestamp column, treating as empty", path.display());
        return Vec::new();
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let Ok(row) = result else {
            skipped += 1;
            continue;
        };
        let Some(timestamp) = row.get(ts_idx).and_then(time::parse_datetime) else {
            skipped += 1;
            continue;
        };
        let game = cols
            .game
            .and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(game) = game else {
            skipped += 1;
            continue;
        };

        let mut rec = CanonicalRecord::new(timestamp, game);
        for kind in MetricKind::ALL {
            // The same plausibility filter as normalization, so a hand-edited
            // or foreign file cannot reinject out-of-range values.
            let value = cols
                .metric(kind)
                .and_then(|i| row.get(i))
                .and_then(metric::parse_loose_number)
                .filter(|v| in_percent_range(*v));
            rec.set_metric(kind, value);
        }
        if !rec.has_any_metric() {
            skipped += 1;
            continue;
        }
        records.push(rec);
    }
    if skipped > 0 {
        warn!("{}: skipped {skipped} malformed rows", path.display());
    }

    records
}

/// Merge two record sets by timestamp. Incoming wins on duplicates; output
/// is ascending by timestamp. Merging the same snapshot twice is a no-op.
///
/// Keys are floored to whole seconds, matching what `write_series` can
/// actually persist; a fractional incoming record would otherwise sit beside
/// its truncated stored twin after a re-run.
pub fn merge_records(
    existing: Vec<CanonicalRecord>,
    incoming: Vec<CanonicalRecord>,
) -> Vec<CanonicalRecord> {
    let mut merged: BTreeMap<NaiveDateTime, CanonicalRecord> = BTreeMap::new();
    for mut rec in existing.into_iter().chain(incoming) {
        rec.timestamp = time::truncate_subsec(rec.timestamp);
        merged.insert(rec.timestamp, rec);
    }
    merged.into_values().collect()
}

/// Write one series file (header row always, ISO-8601 timestamps).
pub fn write_series(path: &Path, records: &[CanonicalRecord]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(4, format!("Failed to create series file '{}': {e}", path.display()))
    })?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(SERIES_HEADER).map_err(|e| {
        AppError::new(4, format!("Failed to write series header '{}': {e}", path.display()))
    })?;
    for rec in records {
        let row = [
            rec.timestamp.format(TIMESTAMP_FMT).to_string(),
            rec.game.clone(),
            format_metric(rec.h24),
            format_metric(rec.week),
            format_metric(rec.month),
            format_metric(rec.rtp),
        ];
        writer.write_record(&row).map_err(|e| {
            AppError::new(4, format!("Failed to write series row '{}': {e}", path.display()))
        })?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush series '{}': {e}", path.display())))
}

fn format_metric(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Result of merging one game's records into its store file.
#[derive(Debug, Clone)]
pub struct EntityWriteStats {
    pub slug: String,
    pub path: PathBuf,
    pub existing: usize,
    pub incoming: usize,
    pub written: usize,
    pub added: usize,
}

/// Merge `incoming` into the store file for `game`, creating the directory
/// and file as needed.
pub fn upsert_entity(
    dir: &Path,
    game: &str,
    incoming: Vec<CanonicalRecord>,
) -> Result<EntityWriteStats, AppError> {
    fs::create_dir_all(dir).map_err(|e| {
        AppError::new(4, format!("Failed to create data dir '{}': {e}", dir.display()))
    })?;

    let slug = slugify(game);
    let path = dir.join(format!("{slug}.csv"));
    let existing = read_series(&path);
    let existing_len = existing.len();
    let incoming_len = incoming.len();

    let merged = merge_records(existing, incoming);
    write_series(&path, &merged)?;

    Ok(EntityWriteStats {
        slug,
        path,
        existing: existing_len,
        incoming: incoming_len,
        written: merged.len(),
        added: merged.len() - existing_len,
    })
}

/// Slugs of every series file in the data directory, sorted.
pub fn list_entities(dir: &Path) -> Vec<String> {
    let mut slugs = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return slugs;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            slugs.push(stem.to_string());
        }
    }
    slugs.sort();
    slugs
}
