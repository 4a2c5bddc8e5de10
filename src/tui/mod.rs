//! Ratatui-based terminal dashboard.
//!
//! The TUI lists the games that have stored series, charts the selected
//! metric over an adjustable window, and marks rows where the 24h return
//! runs hot against the week/month baselines.

use std::io;
use std::time::Duration;

use chrono::NaiveDateTime;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::cli::TuiArgs;
use crate::domain::MetricKind;
use crate::error::AppError;
use crate::store;
use crate::view::signal::{self, SignalFlag, SignalParams};
use crate::view::{CACHE_TTL, SeriesCache, SeriesView, ViewOptions};

mod chart;

use chart::SeriesChart;

/// Chart window choices, in hours. `0` charts everything stored.
const WINDOW_HOURS: [u64; 8] = [0, 6, 12, 24, 72, 168, 336, 720];

/// Resample bucket choices, in minutes. `0` charts raw points.
const RESAMPLE_MINUTES: [u32; 6] = [0, 15, 30, 60, 240, 1440];

/// Start the TUI.
pub fn run(args: TuiArgs) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(&args);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    slugs: Vec<String>,
    selected: usize,
    metric: MetricKind,
    window_hours: u64,
    resample_minutes: u32,
    params: SignalParams,
    selected_field: usize,
    status: String,
    cache: SeriesCache,
}

/// Everything one frame needs from the selected series, computed up front so
/// the draw methods can stay read-only.
struct ChartInfo {
    slug: Option<String>,
    points: usize,
    last: Option<NaiveDateTime>,
    signals: usize,
    data: Option<ChartData>,
}

struct ChartData {
    line: Vec<(f64, f64)>,
    baseline: Vec<(f64, f64)>,
    markers: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

impl App {
    fn new(args: &TuiArgs) -> Self {
        let slugs = store::list_entities(&args.data_dir);
        let status = if slugs.is_empty() {
            format!(
                "No series files in {}. Run `rtpw collect` first.",
                args.data_dir.display()
            )
        } else {
            format!("{} games loaded.", slugs.len())
        };

        Self {
            slugs,
            selected: 0,
            metric: MetricKind::H24,
            window_hours: args.window_hours,
            resample_minutes: args.resample,
            params: SignalParams {
                gap_pp: args.gap,
                ..SignalParams::default()
            },
            selected_field: 0,
            status,
            cache: SeriesCache::new(args.data_dir.clone(), CACHE_TTL),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Up => {
                if self.selected_field > 0 {
                    self.selected_field -= 1;
                }
            }
            KeyCode::Down => {
                if self.selected_field < 7 {
                    self.selected_field += 1;
                }
            }
            KeyCode::Left => self.adjust_field(-1),
            KeyCode::Right => self.adjust_field(1),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('s') => self.toggle_slope(),
            KeyCode::Char('b') => self.toggle_baseline(),
            _ => {}
        }
        false
    }

    fn adjust_field(&mut self, delta: i32) {
        match self.selected_field {
            0 => self.cycle_game(delta),
            1 => {
                self.metric = if delta >= 0 {
                    self.metric.next()
                } else {
                    self.metric.prev()
                };
                self.status = format!("metric: {}", self.metric.display_name());
            }
            2 => {
                self.window_hours = ladder_step(&WINDOW_HOURS, self.window_hours, delta, 4);
                self.status = format!("window: {}", fmt_window(self.window_hours));
            }
            3 => {
                self.resample_minutes =
                    ladder_step(&RESAMPLE_MINUTES, self.resample_minutes, delta, 0);
                self.status = format!("resample: {}", fmt_resample(self.resample_minutes));
            }
            4 => {
                self.params.gap_pp = (self.params.gap_pp + 0.5 * f64::from(delta)).max(0.0);
                self.status = format!("gap: {:.1}pp", self.params.gap_pp);
            }
            5 => {
                self.params.slope_window = self
                    .params
                    .slope_window
                    .saturating_add_signed(delta as isize)
                    .max(2);
                self.status = format!("slope window: {}", self.params.slope_window);
            }
            6 => self.toggle_slope(),
            7 => self.toggle_baseline(),
            _ => {}
        }
    }

    fn cycle_game(&mut self, delta: i32) {
        if self.slugs.is_empty() {
            return;
        }
        let len = self.slugs.len() as i32;
        self.selected = (self.selected as i32 + delta).rem_euclid(len) as usize;
        self.status = format!("game: {}", self.slugs[self.selected]);
    }

    fn toggle_slope(&mut self) {
        self.params.require_slope = !self.params.require_slope;
        self.status = format!(
            "slope filter: {} (window {})",
            on_off(self.params.require_slope),
            self.params.slope_window
        );
    }

    fn toggle_baseline(&mut self) {
        self.params.require_baseline = !self.params.require_baseline;
        self.status = format!("RTP baseline filter: {}", on_off(self.params.require_baseline));
    }

    fn reload(&mut self) {
        self.cache.invalidate();
        self.slugs = store::list_entities(self.cache.dir());
        if self.slugs.is_empty() {
            self.selected = 0;
            self.status = format!(
                "No series files in {}. Run `rtpw collect` first.",
                self.cache.dir().display()
            );
        } else {
            if self.selected >= self.slugs.len() {
                self.selected = self.slugs.len() - 1;
            }
            self.status = format!("Reloaded {} games.", self.slugs.len());
        }
    }

    /// Load the selected series and precompute this frame's chart data.
    fn current_chart(&mut self) -> ChartInfo {
        let Some(slug) = self.slugs.get(self.selected).cloned() else {
            return ChartInfo {
                slug: None,
                points: 0,
                last: None,
                signals: 0,
                data: None,
            };
        };

        let records = self.cache.get_or_load(&slug);
        let latest = records.last().map(|r| r.timestamp);
        let opts = view_options(self.window_hours, self.resample_minutes, latest);
        let view = SeriesView::build(records, &opts);
        // Flags come from the windowed (and resampled) view, so the header
        // count and the chart markers agree with what is actually plotted.
        let flags = signal::detect(&view.records, &self.params);
        let data = build_chart_data(&view, self.metric, &flags);

        ChartInfo {
            slug: Some(slug),
            points: view.len(),
            last: view.last_timestamp(),
            signals: flags.len(),
            data,
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let info = self.current_chart();

        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0], &info);
        self.draw_body(frame, chunks[1], &info);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect, info: &ChartInfo) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("rtpw", Style::default().fg(Color::Cyan)),
            Span::raw(" - slot RTP dashboard"),
        ]));

        let game = info.slug.as_deref().unwrap_or("-");
        let last = info
            .last
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(Span::styled(
            format!(
                "game: {game} | metric: {} | window: {} | resample: {} | points: {} | last: {last}",
                self.metric.display_name(),
                fmt_window(self.window_hours),
                fmt_resample(self.resample_minutes),
                info.points,
            ),
            Style::default().fg(Color::Gray),
        )));

        if info.slug.is_some() {
            lines.push(Line::from(Span::styled(
                format!(
                    "signals: {} (gap {:.1}pp, slope {}, baseline {})",
                    info.signals,
                    self.params.gap_pp,
                    on_off(self.params.require_slope),
                    on_off(self.params.require_baseline),
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect, info: &ChartInfo) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(10)])
            .split(area);

        self.draw_chart(frame, chunks[0], info);
        self.draw_settings(frame, chunks[1], info);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, info: &ChartInfo) {
        let title = match (&info.slug, self.metric) {
            (Some(slug), metric) => format!("{slug} - {}", metric.display_name()),
            (None, _) => "Series".to_string(),
        };
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(data) = &info.data else {
            let msg = if info.slug.is_none() {
                "No stored series. Run `rtpw collect`, then press r."
            } else {
                "No points for this metric in the selected window."
            };
            let hint = Paragraph::new(msg)
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(hint, inner);
            return;
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = SeriesChart {
            line: &data.line,
            baseline: &data.baseline,
            markers: &data.markers,
            x_bounds: data.x_bounds,
            y_bounds: data.y_bounds,
            x_label: "time",
            y_label: format!("{} %", self.metric.display_name()),
            fmt_x: fmt_axis_time,
            fmt_y: fmt_axis_percent,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, data.x_bounds, data.y_bounds);
        }
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect, info: &ChartInfo) {
        let game_label = match &info.slug {
            Some(slug) => format!("{slug} ({}/{})", self.selected + 1, self.slugs.len()),
            None => "-".to_string(),
        };

        let items = vec![
            ListItem::new(format!("Game: {game_label}")),
            ListItem::new(format!("Metric: {}", self.metric.display_name())),
            ListItem::new(format!("Window: {}", fmt_window(self.window_hours))),
            ListItem::new(format!("Resample: {}", fmt_resample(self.resample_minutes))),
            ListItem::new(format!("Gap: {:.1}pp", self.params.gap_pp)),
            ListItem::new(format!("Slope window: {}", self.params.slope_window)),
            ListItem::new(format!(
                "Slope filter: {}",
                on_off(self.params.require_slope)
            )),
            ListItem::new(format!(
                "RTP baseline filter: {}",
                on_off(self.params.require_baseline)
            )),
        ];

        let list = List::new(items)
            .block(Block::default().title("Settings").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ adjust  r reload  s slope  b baseline  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Window/resample choices move along a fixed ladder; unknown CLI values
/// start from `default_idx`.
fn ladder_step<T: Copy + PartialEq>(ladder: &[T], current: T, delta: i32, default_idx: usize) -> T {
    let idx = ladder
        .iter()
        .position(|&v| v == current)
        .unwrap_or(default_idx) as i32;
    let next = (idx + delta).clamp(0, ladder.len() as i32 - 1) as usize;
    ladder[next]
}

fn view_options(
    window_hours: u64,
    resample_minutes: u32,
    latest: Option<NaiveDateTime>,
) -> ViewOptions {
    let mut opts = ViewOptions::default();
    // The window is anchored on the newest stored point, not the wall clock,
    // so stale series still chart something.
    if window_hours > 0 {
        if let Some(latest) = latest {
            opts.from = Some(latest - chrono::Duration::hours(window_hours as i64));
        }
    }
    if resample_minutes > 0 {
        opts.resample_minutes = Some(resample_minutes);
    }
    opts
}

/// Build chart series for Plotters.
fn build_chart_data(
    view: &SeriesView,
    metric: MetricKind,
    flags: &[SignalFlag],
) -> Option<ChartData> {
    let line: Vec<(f64, f64)> = view
        .points(metric)
        .into_iter()
        .map(|(t, v)| (t as f64, v))
        .collect();
    if line.is_empty() {
        return None;
    }

    let baseline: Vec<(f64, f64)> = if metric == MetricKind::Rtp {
        Vec::new()
    } else {
        view.points(MetricKind::Rtp)
            .into_iter()
            .map(|(t, v)| (t as f64, v))
            .collect()
    };

    let mut x0 = line[0].0;
    let mut x1 = line[line.len() - 1].0;
    if x1 <= x0 {
        // A single point still needs a non-degenerate axis.
        x0 -= 1800.0;
        x1 += 1800.0;
    }

    // Signal markers carry 24h values, so they only belong on the 24h chart.
    let markers: Vec<(f64, f64)> = if metric == MetricKind::H24 {
        flags
            .iter()
            .map(|f| (f.timestamp.and_utc().timestamp() as f64, f.h24))
            .filter(|&(x, _)| x >= x0 && x <= x1)
            .collect()
    } else {
        Vec::new()
    };

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in line.iter().chain(baseline.iter()) {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !y_min.is_finite() || !y_max.is_finite() {
        return None;
    }
    if y_max <= y_min {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-9);

    Some(ChartData {
        line,
        baseline,
        markers,
        x_bounds: [x0, x1],
        y_bounds: [y_min - pad, y_max + pad],
    })
}

fn fmt_window(hours: u64) -> String {
    if hours == 0 {
        "all".to_string()
    } else {
        format!("{hours}h")
    }
}

fn fmt_resample(minutes: u32) -> String {
    if minutes == 0 {
        "raw".to_string()
    } else {
        format!("{minutes}m")
    }
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn fmt_axis_time(v: f64) -> String {
    match chrono::DateTime::from_timestamp(v as i64, 0) {
        Some(dt) => dt.naive_utc().format("%m-%d %H:%M").to_string(),
        None => String::new(),
    }
}

fn fmt_axis_percent(v: f64) -> String {
    format!("{v:.1}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let style = Style::default().fg(Color::Gray);

    // Time labels are wide, so three ticks keep them from colliding.
    let x_ticks = 3usize;
    for i in 0..x_ticks {
        let u = i as f64 / (x_ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis_time(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let y_ticks = 5usize;
    for i in 0..y_ticks {
        let u = i as f64 / (y_ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_percent(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("time")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("%")
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
