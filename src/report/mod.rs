//! Run reporting: per-file outcomes and per-entity write statistics.

use crate::domain::SkipReason;
use crate::store::EntityWriteStats;

pub mod format;

pub use format::{format_run_summary, format_signals};

/// What happened to a single file during a collect or normalize run.
#[derive(Debug, Clone)]
pub enum FileStatus {
    /// The file produced canonical records.
    Parsed { records: usize, rows_dropped: usize },
    /// The file was readable but carried nothing usable.
    Skipped(SkipReason),
    /// The download from Drive failed.
    DownloadFailed(String),
    /// The local file could not be opened or decoded.
    Unreadable(String),
}

/// One listed file and its outcome.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub name: String,
    pub status: FileStatus,
}

/// Everything a single run did, for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Files the Drive listing (or the local scan) produced.
    pub listed: usize,
    pub outcomes: Vec<FileOutcome>,
    pub entities: Vec<EntityWriteStats>,
}

impl RunReport {
    pub fn parsed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FileStatus::Parsed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FileStatus::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    FileStatus::DownloadFailed(_) | FileStatus::Unreadable(_)
                )
            })
            .count()
    }

    /// Canonical records produced across all parsed files.
    pub fn records_extracted(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match o.status {
                FileStatus::Parsed { records, .. } => Some(records),
                _ => None,
            })
            .sum()
    }

    /// Rows read but dropped across all parsed files.
    pub fn rows_dropped(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match o.status {
                FileStatus::Parsed { rows_dropped, .. } => Some(rows_dropped),
                _ => None,
            })
            .sum()
    }

    /// Rows that were new to their series file (not replacements).
    pub fn records_added(&self) -> usize {
        self.entities.iter().map(|e| e.added).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn run_report_counts() {
        let report = RunReport {
            listed: 4,
            outcomes: vec![
                FileOutcome {
                    name: "a.xlsx".to_string(),
                    status: FileStatus::Parsed {
                        records: 10,
                        rows_dropped: 2,
                    },
                },
                FileOutcome {
                    name: "b.xlsx".to_string(),
                    status: FileStatus::Parsed {
                        records: 3,
                        rows_dropped: 0,
                    },
                },
                FileOutcome {
                    name: "c.xlsx".to_string(),
                    status: FileStatus::Skipped(SkipReason::NoMetricColumns),
                },
                FileOutcome {
                    name: "d.xlsx".to_string(),
                    status: FileStatus::DownloadFailed("timeout".to_string()),
                },
            ],
            entities: vec![EntityWriteStats {
                slug: "book-of-x".to_string(),
                path: PathBuf::from("data/normalized/book-of-x.csv"),
                existing: 5,
                incoming: 13,
                written: 16,
                added: 11,
            }],
        };

        assert_eq!(report.parsed(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.records_extracted(), 13);
        assert_eq!(report.rows_dropped(), 2);
        assert_eq!(report.records_added(), 11);
    }
}
