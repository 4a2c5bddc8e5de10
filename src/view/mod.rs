//! Read-side query logic for the dashboard and the `signals` command.
//!
//! Everything here is stateless over the store: load records, apply a
//! window, optionally resample, hand the result to a renderer. The only
//! state is a short-lived per-entity cache so the TUI does not re-read the
//! CSV on every keypress.

pub mod signal;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime};

use crate::domain::{CanonicalRecord, MetricKind};
use crate::store;

/// How long a cached entity series stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(180);

/// Windowing and resampling options for one view of a series.
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    /// Keep only the last N points (applied after resampling).
    pub last_steps: Option<usize>,
    /// Mean-resample into fixed buckets of this many minutes.
    pub resample_minutes: Option<u32>,
}

/// A windowed (and possibly resampled) slice of one entity's series.
#[derive(Debug, Clone)]
pub struct SeriesView {
    pub records: Vec<CanonicalRecord>,
}

impl SeriesView {
    /// Apply `opts` to a full series: time window, then resample, then the
    /// last-N-steps cut, in that order.
    pub fn build(records: &[CanonicalRecord], opts: &ViewOptions) -> Self {
        let mut windowed: Vec<CanonicalRecord> = records
            .iter()
            .filter(|r| opts.from.is_none_or(|from| r.timestamp >= from))
            .filter(|r| opts.to.is_none_or(|to| r.timestamp <= to))
            .cloned()
            .collect();

        if let Some(minutes) = opts.resample_minutes {
            windowed = resample_mean(&windowed, minutes);
        }

        if let Some(n) = opts.last_steps {
            if windowed.len() > n {
                windowed.drain(..windowed.len() - n);
            }
        }

        Self { records: windowed }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.records.last().map(|r| r.timestamp)
    }

    /// `(epoch seconds, value)` pairs for one metric, nulls skipped. This is
    /// the shape the chart widget consumes.
    pub fn points(&self, kind: MetricKind) -> Vec<(i64, f64)> {
        self.records
            .iter()
            .filter_map(|r| {
                r.metric(kind)
                    .map(|v| (r.timestamp.and_utc().timestamp(), v))
            })
            .collect()
    }
}

/// Mean-resample into fixed buckets. The bucket key is the timestamp floored
/// to the interval; each metric averages over its non-null values only.
fn resample_mean(records: &[CanonicalRecord], minutes: u32) -> Vec<CanonicalRecord> {
    if minutes == 0 || records.is_empty() {
        return records.to_vec();
    }
    let bucket_secs = i64::from(minutes) * 60;

    let mut buckets: BTreeMap<i64, Vec<&CanonicalRecord>> = BTreeMap::new();
    for rec in records {
        let secs = rec.timestamp.and_utc().timestamp();
        let key = secs.div_euclid(bucket_secs) * bucket_secs;
        buckets.entry(key).or_default().push(rec);
    }

    buckets
        .into_iter()
        .filter_map(|(key, group)| {
            let timestamp = DateTime::from_timestamp(key, 0)?.naive_utc();
            let mut rec = CanonicalRecord::new(timestamp, group[0].game.clone());
            for kind in MetricKind::ALL {
                let values: Vec<f64> = group.iter().filter_map(|r| r.metric(kind)).collect();
                if !values.is_empty() {
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    rec.set_metric(kind, Some(mean));
                }
            }
            Some(rec)
        })
        .collect()
}

struct CacheEntry {
    loaded_at: Instant,
    records: Vec<CanonicalRecord>,
}

/// Time-boxed per-entity series cache for the TUI.
pub struct SeriesCache {
    dir: PathBuf,
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl SeriesCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached records for one entity, re-reading from disk when the entry is
    /// older than the TTL.
    pub fn get_or_load(&mut self, slug: &str) -> &[CanonicalRecord] {
        let fresh = self
            .entries
            .get(slug)
            .is_some_and(|e| e.loaded_at.elapsed() < self.ttl);
        if !fresh {
            let records = store::read_series(&store::entity_path(&self.dir, slug));
            self.entries.insert(
                slug.to_string(),
                CacheEntry {
                    loaded_at: Instant::now(),
                    records,
                },
            );
        }
        match self.entries.get(slug) {
            Some(entry) => &entry.records,
            None => &[],
        }
    }

    /// Drop everything; the next access re-reads from disk.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
