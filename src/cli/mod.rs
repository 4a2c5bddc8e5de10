//! Command-line parsing for the Drive-based RTP watcher.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the collection/store code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rtpw", version, about = "Slot RTP collector and dashboard (Drive-based)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download spreadsheets from a Drive folder and fold them into per-game series.
    Collect(CollectArgs),
    /// Re-normalize spreadsheets already sitting in the raw directory.
    Normalize(NormalizeArgs),
    /// Scan one game's stored series and print threshold signals.
    Signals(SignalsArgs),
    /// Launch the interactive TUI dashboard.
    ///
    /// This reads the same per-game series files `rtpw collect` writes, but
    /// renders them as charts in a terminal UI using Ratatui.
    Tui(TuiArgs),
}

/// Options for collecting from Drive.
#[derive(Debug, Parser, Clone)]
pub struct CollectArgs {
    /// Drive folder to collect from (a folder id or a full Drive URL).
    #[arg(short = 'f', long = "folder-id", value_name = "ID_OR_URL")]
    pub folder: String,

    /// Directory downloaded spreadsheets land in.
    #[arg(long, default_value = "data/incoming")]
    pub raw_dir: PathBuf,

    /// Directory the per-game series files live in.
    #[arg(long, default_value = "data/normalized")]
    pub data_dir: PathBuf,

    /// Keep previously downloaded files instead of wiping the raw directory.
    #[arg(long)]
    pub keep_raw: bool,

    /// HTTP timeout (seconds) for Drive requests.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

/// Options for re-normalizing already-downloaded files.
#[derive(Debug, Parser, Clone)]
pub struct NormalizeArgs {
    /// Directory to scan for spreadsheets.
    #[arg(long, default_value = "data/incoming")]
    pub raw_dir: PathBuf,

    /// Directory the per-game series files live in.
    #[arg(long, default_value = "data/normalized")]
    pub data_dir: PathBuf,
}

/// Options for the signal scan.
#[derive(Debug, Parser, Clone)]
pub struct SignalsArgs {
    /// Game to scan (display name or series slug).
    pub game: String,

    /// Directory the per-game series files live in.
    #[arg(long, default_value = "data/normalized")]
    pub data_dir: PathBuf,

    /// Required gap, in percentage points, of 24h over week and month.
    #[arg(long, default_value_t = 2.0)]
    pub gap: f64,

    /// Also require a rising 24h trend over the trailing points.
    #[arg(long)]
    pub slope: bool,

    /// Trailing point count for the slope requirement.
    #[arg(long, default_value_t = 3)]
    pub slope_window: usize,

    /// Also require 24h above the game's published RTP.
    #[arg(long)]
    pub baseline: bool,

    /// Scan only the trailing N stored records.
    #[arg(long)]
    pub last: Option<usize>,
}

/// Options for the TUI dashboard.
#[derive(Debug, Parser, Clone)]
pub struct TuiArgs {
    /// Directory the per-game series files live in.
    #[arg(long, default_value = "data/normalized")]
    pub data_dir: PathBuf,

    /// Initial chart window in hours (0 shows everything stored).
    #[arg(long, default_value_t = 72)]
    pub window_hours: u64,

    /// Initial resample bucket in minutes (0 charts raw points).
    #[arg(long, default_value_t = 0)]
    pub resample: u32,

    /// Signal gap in percentage points for chart markers.
    #[arg(long, default_value_t = 2.0)]
    pub gap: f64,
}
