//! Formatted terminal output for collection runs and signal scans.
//!
//! We keep formatting code in one place so:
//! - the pipeline stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::report::{FileStatus, RunReport};
use crate::store::EntityWriteStats;
use crate::view::signal::{SignalFlag, SignalParams};

/// Format the end-of-run summary (file outcomes + per-game series stats).
pub fn format_run_summary(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str("=== rtpw - slot RTP collection ===\n");
    out.push_str(&format!(
        "Files: listed={} | parsed={} | skipped={} | failed={}\n",
        report.listed,
        report.parsed(),
        report.skipped(),
        report.failed(),
    ));
    out.push_str(&format!(
        "Records: extracted={} | rows dropped={} | new rows={}\n",
        report.records_extracted(),
        report.rows_dropped(),
        report.records_added(),
    ));

    if !report.outcomes.is_empty() {
        out.push_str("\nFile outcomes:\n");
        for o in &report.outcomes {
            let name = truncate(&o.name, 32);
            let line = match &o.status {
                FileStatus::Parsed {
                    records,
                    rows_dropped,
                } if *rows_dropped > 0 => {
                    format!("  {name:<32} {records} records ({rows_dropped} rows dropped)")
                }
                FileStatus::Parsed { records, .. } => {
                    format!("  {name:<32} {records} records")
                }
                FileStatus::Skipped(reason) => {
                    format!("  {name:<32} skipped: {reason}")
                }
                FileStatus::DownloadFailed(err) => {
                    format!("  {name:<32} download failed: {err}")
                }
                FileStatus::Unreadable(err) => {
                    format!("  {name:<32} unreadable: {err}")
                }
            };
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }

    if !report.entities.is_empty() {
        out.push_str("\nSeries written:\n");
        out.push_str(&format_entity_table(&report.entities));
    }

    out
}

fn format_entity_table(entities: &[EntityWriteStats]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<24} {:>9} {:>9} {:>9} {:>6}\n",
            "game", "existing", "incoming", "written", "new"
        )
        .trim_end(),
    );
    out.push('\n');

    out.push_str(
        format!(
            "{:-<24} {:-<9} {:-<9} {:-<9} {:-<6}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for e in entities {
        out.push_str(
            format!(
                "{:<24} {:>9} {:>9} {:>9} {:>6}\n",
                truncate(&e.slug, 24),
                e.existing,
                e.incoming,
                e.written,
                e.added,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Format a signal scan over one game's stored series.
pub fn format_signals(game: &str, flags: &[SignalFlag], params: &SignalParams) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== rtpw - signals for {game} ===\n"));
    out.push_str(&format!(
        "Rule: 24h >= week+{gap:.1}pp and 24h >= month+{gap:.1}pp{slope}{baseline}\n",
        gap = params.gap_pp,
        slope = if params.require_slope {
            ", rising slope"
        } else {
            ""
        },
        baseline = if params.require_baseline {
            ", 24h above RTP"
        } else {
            ""
        },
    ));

    if flags.is_empty() {
        out.push_str("No signals in the stored series.\n");
        return out;
    }

    out.push_str(&format!("Signals: {}\n\n", flags.len()));

    out.push_str(
        format!(
            "{:<19} {:>8} {:>9} {:>9} {:>8}\n",
            "timestamp", "24h", "vs week", "vs month", "slope"
        )
        .trim_end(),
    );
    out.push('\n');

    out.push_str(
        format!(
            "{:-<19} {:-<8} {:-<9} {:-<9} {:-<8}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for f in flags {
        out.push_str(
            format!(
                "{:<19} {:>8.2} {:>9} {:>9} {:>8}\n",
                f.timestamp.format("%Y-%m-%d %H:%M:%S"),
                f.h24,
                format!("+{:.2}", f.gap_week),
                format!("+{:.2}", f.gap_month),
                fmt_slope(f.slope),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_slope(slope: Option<f64>) -> String {
    match slope {
        Some(s) => format!("{s:+.3}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::path::PathBuf;

    use crate::domain::SkipReason;
    use crate::report::FileOutcome;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn run_summary_counts_and_outcomes() {
        let report = RunReport {
            listed: 3,
            outcomes: vec![
                FileOutcome {
                    name: "daily.xlsx".to_string(),
                    status: FileStatus::Parsed {
                        records: 10,
                        rows_dropped: 2,
                    },
                },
                FileOutcome {
                    name: "empty.xlsx".to_string(),
                    status: FileStatus::Skipped(SkipReason::NoTimestampColumn),
                },
                FileOutcome {
                    name: "broken.xlsx".to_string(),
                    status: FileStatus::Unreadable("not a workbook".to_string()),
                },
            ],
            entities: vec![EntityWriteStats {
                slug: "book-of-x".to_string(),
                path: PathBuf::from("data/normalized/book-of-x.csv"),
                existing: 5,
                incoming: 10,
                written: 12,
                added: 7,
            }],
        };

        let text = format_run_summary(&report);
        assert!(text.contains("listed=3 | parsed=1 | skipped=1 | failed=1"));
        assert!(text.contains("extracted=10 | rows dropped=2 | new rows=7"));
        assert!(text.contains("daily.xlsx"));
        assert!(text.contains("(2 rows dropped)"));
        assert!(text.contains("skipped: no timestamp column"));
        assert!(text.contains("unreadable: not a workbook"));
        assert!(text.contains("book-of-x"));
    }

    #[test]
    fn run_summary_omits_empty_sections() {
        let report = RunReport {
            listed: 0,
            outcomes: vec![],
            entities: vec![],
        };

        let text = format_run_summary(&report);
        assert!(text.contains("listed=0"));
        assert!(!text.contains("File outcomes"));
        assert!(!text.contains("Series written"));
    }

    #[test]
    fn signals_table_lists_flags() {
        let flags = vec![
            SignalFlag {
                index: 4,
                timestamp: ts(2, 10),
                h24: 108.5,
                gap_week: 4.25,
                gap_month: 6.0,
                slope: Some(0.51),
            },
            SignalFlag {
                index: 7,
                timestamp: ts(3, 12),
                h24: 104.0,
                gap_week: 2.0,
                gap_month: 2.5,
                slope: None,
            },
        ];

        let text = format_signals("book-of-x", &flags, &SignalParams::default());
        assert!(text.contains("signals for book-of-x"));
        assert!(text.contains("Signals: 2"));
        assert!(text.contains("2024-01-02 10:00:00"));
        assert!(text.contains("+4.25"));
        assert!(text.contains("+0.510"));
        // A flag without enough history shows a slope placeholder.
        assert!(text.contains(" -"));
    }

    #[test]
    fn signals_rule_line_reflects_params() {
        let params = SignalParams {
            gap_pp: 3.0,
            slope_window: 4,
            require_slope: true,
            require_baseline: true,
        };

        let text = format_signals("gates", &[], &params);
        assert!(text.contains("week+3.0pp"));
        assert!(text.contains("rising slope"));
        assert!(text.contains("24h above RTP"));
        assert!(text.contains("No signals"));
    }

    #[test]
    fn truncate_shortens_long_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-game-name", 10), "a-very-lo.");
    }
}
