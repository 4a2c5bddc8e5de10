//! Shared collection pipeline used by both `collect` and `normalize`.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! Drive listing -> download -> table read -> normalization -> per-game merge
//!
//! The CLI front-ends then focus on presentation (summaries vs exit codes).

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::data::drive::{DriveClient, extract_folder_id};
use crate::data::sheet;
use crate::domain::{CanonicalRecord, CollectConfig, NormalizeConfig};
use crate::error::AppError;
use crate::extract::normalize_table;
use crate::report::{FileOutcome, FileStatus, RunReport};
use crate::store;

/// Execute a full Drive collection run and return the report.
pub fn run_collect(config: &CollectConfig) -> Result<RunReport, AppError> {
    let Some(folder_id) = extract_folder_id(&config.folder) else {
        return Err(AppError::new(
            2,
            format!(
                "'{}' does not look like a Drive folder id or folder URL.",
                config.folder
            ),
        ));
    };

    let client = DriveClient::from_env(config.timeout_secs)?;
    prepare_raw_dir(&config.raw_dir, config.keep_raw)?;

    let files = client.list_spreadsheets(&folder_id)?;
    info!(files = files.len(), folder = %folder_id, "drive listing complete");

    let collected_at = Utc::now().naive_utc();
    let mut report = RunReport {
        listed: files.len(),
        ..Default::default()
    };
    let mut records = Vec::new();

    // Two Drive files may carry the same name; the id prefix keeps both.
    let mut taken: HashSet<String> = HashSet::new();
    for file in &files {
        let mut name = file.local_name();
        if !taken.insert(name.clone()) {
            let prefix: String = file.id.chars().take(8).collect();
            name = format!("{prefix}_{name}");
            taken.insert(name.clone());
        }

        let path = config.raw_dir.join(&name);
        if let Err(err) = client.download_to(file, &path) {
            warn!(file = %file.name, error = %err, "download failed");
            report.outcomes.push(FileOutcome {
                name,
                status: FileStatus::DownloadFailed(err.to_string()),
            });
            continue;
        }

        ingest_file(&path, &name, collected_at, &mut report.outcomes, &mut records);
    }

    write_store(&config.data_dir, records, &mut report)?;
    Ok(report)
}

/// Re-run normalization over spreadsheets already on disk.
pub fn run_normalize(config: &NormalizeConfig) -> Result<RunReport, AppError> {
    let files = scan_raw_dir(&config.raw_dir)?;
    let collected_at = Utc::now().naive_utc();

    let mut report = RunReport {
        listed: files.len(),
        ..Default::default()
    };
    let mut records = Vec::new();
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ingest_file(path, &name, collected_at, &mut report.outcomes, &mut records);
    }

    write_store(&config.data_dir, records, &mut report)?;
    Ok(report)
}

/// Read one spreadsheet and fold its records into the run.
fn ingest_file(
    path: &Path,
    display_name: &str,
    collected_at: NaiveDateTime,
    outcomes: &mut Vec<FileOutcome>,
    records: &mut Vec<CanonicalRecord>,
) {
    let table = match sheet::read_table(path) {
        Ok(table) => table,
        Err(err) => {
            warn!(file = display_name, error = %err, "unreadable spreadsheet");
            outcomes.push(FileOutcome {
                name: display_name.to_string(),
                status: FileStatus::Unreadable(err),
            });
            return;
        }
    };

    let fallback_game = sheet::file_stem(path);
    match normalize_table(&table, &fallback_game, collected_at) {
        Ok(normalized) => {
            outcomes.push(FileOutcome {
                name: display_name.to_string(),
                status: FileStatus::Parsed {
                    records: normalized.records.len(),
                    rows_dropped: normalized.rows_dropped,
                },
            });
            records.extend(normalized.records);
        }
        Err(reason) => {
            warn!(file = display_name, %reason, "file skipped");
            outcomes.push(FileOutcome {
                name: display_name.to_string(),
                status: FileStatus::Skipped(reason),
            });
        }
    }
}

/// Merge this run's records into the per-game series files.
fn write_store(
    data_dir: &Path,
    records: Vec<CanonicalRecord>,
    report: &mut RunReport,
) -> Result<(), AppError> {
    let mut by_game: BTreeMap<String, Vec<CanonicalRecord>> = BTreeMap::new();
    for record in records {
        let slug = store::slugify(&record.game);
        by_game.entry(slug).or_default().push(record);
    }

    for (slug, group) in by_game {
        let stats = store::upsert_entity(data_dir, &slug, group)?;
        info!(game = %stats.slug, added = stats.added, total = stats.written, "series updated");
        report.entities.push(stats);
    }
    Ok(())
}

fn prepare_raw_dir(dir: &Path, keep_raw: bool) -> Result<(), AppError> {
    if !keep_raw && dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| {
            AppError::new(
                4,
                format!("Failed to clear raw directory {}: {e}.", dir.display()),
            )
        })?;
    }
    fs::create_dir_all(dir).map_err(|e| {
        AppError::new(
            4,
            format!("Failed to create raw directory {}: {e}.", dir.display()),
        )
    })?;
    Ok(())
}

/// Recursively list supported spreadsheets under `dir`, sorted by path.
fn scan_raw_dir(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Err(AppError::new(
            2,
            format!("Raw directory {} does not exist.", dir.display()),
        ));
    }

    let mut out = Vec::new();
    walk(dir, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::new(4, format!("Failed to read {}: {e}.", dir.display())))?;
    for entry in entries {
        let entry = entry
            .map_err(|e| AppError::new(4, format!("Failed to read {}: {e}.", dir.display())))?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if sheet::is_supported(&path) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn normalize_run_builds_per_game_series() {
        let tmp = tempfile::tempdir().unwrap();
        let raw_dir = tmp.path().join("incoming");
        let data_dir = tmp.path().join("normalized");
        write_file(
            &raw_dir,
            "export.csv",
            "Text,Text1,Text2,Text3,Text4,Current_time\n\
             Book of X,24H96.7%,Week104.1%,Month80.2%,RTP95.0%,2024-01-01 10:00:00\n",
        );

        let config = NormalizeConfig {
            raw_dir,
            data_dir: data_dir.clone(),
        };
        let report = run_normalize(&config).unwrap();

        assert_eq!(report.listed, 1);
        assert_eq!(report.parsed(), 1);
        assert_eq!(report.records_extracted(), 1);
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].slug, "book-of-x");

        let records = store::read_series(&data_dir.join("book-of-x.csv"));
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.game, "Book of X");
        assert_eq!(r.timestamp.to_string(), "2024-01-01 10:00:00");
        assert_eq!(r.h24, Some(96.7));
        assert_eq!(r.week, Some(104.1));
        assert_eq!(r.month, Some(80.2));
        assert_eq!(r.rtp, Some(95.0));
    }

    #[test]
    fn normalize_run_merges_files_for_the_same_game() {
        let tmp = tempfile::tempdir().unwrap();
        let raw_dir = tmp.path().join("incoming");
        let data_dir = tmp.path().join("normalized");
        write_file(
            &raw_dir,
            "morning.csv",
            "game,24h,week,month,rtp,timestamp\n\
             Gates,101.0,99.0,98.0,96.0,2024-01-01 08:00:00\n",
        );
        write_file(
            &raw_dir,
            "evening.csv",
            "game,24h,week,month,rtp,timestamp\n\
             Gates,104.0,99.5,98.0,96.0,2024-01-01 20:00:00\n",
        );

        let config = NormalizeConfig {
            raw_dir,
            data_dir: data_dir.clone(),
        };
        let report = run_normalize(&config).unwrap();

        assert_eq!(report.parsed(), 2);
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.entities[0].written, 2);

        let records = store::read_series(&data_dir.join("gates.csv"));
        assert_eq!(records.len(), 2);
        assert!(records[0].timestamp < records[1].timestamp);
    }

    #[test]
    fn normalize_run_records_skips_and_ignores_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        let raw_dir = tmp.path().join("incoming");
        let data_dir = tmp.path().join("normalized");
        // No timestamp column anywhere, and no label to synthesize from.
        write_file(&raw_dir, "junk.csv", "a,b\nfoo,bar\n");
        write_file(&raw_dir, "notes.txt", "not a spreadsheet");

        let config = NormalizeConfig { raw_dir, data_dir };
        let report = run_normalize(&config).unwrap();

        // The .txt file is never listed; the junk csv is listed but skipped.
        assert_eq!(report.listed, 1);
        assert_eq!(report.parsed(), 0);
        assert_eq!(report.skipped(), 1);
        assert!(report.entities.is_empty());
    }

    #[test]
    fn normalize_run_requires_the_raw_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = NormalizeConfig {
            raw_dir: tmp.path().join("missing"),
            data_dir: tmp.path().join("normalized"),
        };

        let err = run_normalize(&config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn scan_finds_nested_spreadsheets_only() {
        let tmp = tempfile::tempdir().unwrap();
        let raw_dir = tmp.path().join("incoming");
        write_file(&raw_dir, "a.csv", "x\n");
        write_file(&raw_dir, "sub/b.xlsx", "");
        write_file(&raw_dir, "sub/readme.md", "hi");

        let found = scan_raw_dir(&raw_dir).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv".to_string(), "b.xlsx".to_string()]);
    }
}
