//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - drives collect / normalize runs
//! - prints run summaries and signal tables
//! - hands off to the TUI dashboard

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{CollectArgs, Command, NormalizeArgs, SignalsArgs};
use crate::domain::{CollectConfig, NormalizeConfig};
use crate::error::AppError;
use crate::view::signal::{self, SignalParams};

pub mod pipeline;

/// Entry point for the `rtpw` binary.
pub fn run() -> Result<(), AppError> {
    // We want `rtpw` and `rtpw --data-dir d` to behave like `rtpw tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing. This preserves a clean clap structure while
    // retaining the requested UX.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    // The TUI owns the terminal, so the fmt subscriber stays off there.
    if !matches!(cli.command, Command::Tui(_)) {
        init_tracing();
    }

    match cli.command {
        Command::Collect(args) => handle_collect(args),
        Command::Normalize(args) => handle_normalize(args),
        Command::Signals(args) => handle_signals(args),
        Command::Tui(args) => crate::tui::run(args),
    }
}

fn handle_collect(args: CollectArgs) -> Result<(), AppError> {
    let config = collect_config_from_args(&args);
    let report = pipeline::run_collect(&config)?;
    println!("{}", crate::report::format_run_summary(&report));
    Ok(())
}

fn handle_normalize(args: NormalizeArgs) -> Result<(), AppError> {
    let config = normalize_config_from_args(&args);
    let report = pipeline::run_normalize(&config)?;
    println!("{}", crate::report::format_run_summary(&report));
    Ok(())
}

fn handle_signals(args: SignalsArgs) -> Result<(), AppError> {
    let path = crate::store::entity_path(&args.data_dir, &args.game);
    let mut records = crate::store::read_series(&path);
    if records.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No stored data for '{}' (looked for {}).",
                args.game,
                path.display()
            ),
        ));
    }
    if let Some(last) = args.last {
        let skip = records.len().saturating_sub(last);
        records.drain(..skip);
    }

    let params = SignalParams {
        gap_pp: args.gap,
        slope_window: args.slope_window,
        require_slope: args.slope,
        require_baseline: args.baseline,
    };
    let flags = signal::detect(&records, &params);
    println!(
        "{}",
        crate::report::format_signals(&crate::store::slugify(&args.game), &flags, &params)
    );
    Ok(())
}

pub fn collect_config_from_args(args: &CollectArgs) -> CollectConfig {
    CollectConfig {
        folder: args.folder.clone(),
        raw_dir: args.raw_dir.clone(),
        data_dir: args.data_dir.clone(),
        keep_raw: args.keep_raw,
        timeout_secs: args.timeout,
    }
}

pub fn normalize_config_from_args(args: &NormalizeArgs) -> NormalizeConfig {
    NormalizeConfig {
        raw_dir: args.raw_dir.clone(),
        data_dir: args.data_dir.clone(),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .try_init();
}

/// Rewrite argv so `rtpw` defaults to `rtpw tui`.
///
/// Rules:
/// - `rtpw`                      -> `rtpw tui`
/// - `rtpw --data-dir d ...`     -> `rtpw tui --data-dir d ...`
/// - `rtpw --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "collect" | "normalize" | "signals" | "tui"
    );
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
