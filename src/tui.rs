use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};
use std::sync::{Arc, Mutex};
use std::thread;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::config::PipelineConfig;
use crate::error::KiraError;
use crate::pipeline::{ProgressEvent, ProgressSink, RunSummary};

const EVENTS_MAX: usize = 6;
const LOGS_MAX: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prepare,
    Fetch,
    Join,
    Annotate,
    Store,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Prepare => "Prepare",
            Phase::Fetch => "Fetch",
            Phase::Join => "Join",
            Phase::Annotate => "Annotate",
            Phase::Store => "Store",
        }
    }

    fn index(self) -> usize {
        match self {
            Phase::Prepare => 0,
            Phase::Fetch => 1,
            Phase::Join => 2,
            Phase::Annotate => 3,
            Phase::Store => 4,
        }
    }
}

#[derive(Debug)]
struct AppState {
    status: String,
    phase: Phase,
    latency_ms: Option<u128>,
    request_count: u64,
    events: VecDeque<String>,
    logs: VecDeque<String>,
    summary: Option<RunSummary>,
    started: Instant,
    active: bool,
}

pub struct Tui {
    species: String,
    state: Arc<Mutex<AppState>>,
}

struct TuiProgress {
    state: Arc<Mutex<AppState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some((phase, payload)) = parse_phase(&message) {
                state.phase = phase;
                state.status = payload.to_string();
            } else if let Some(latency) = parse_latency(&message) {
                state.latency_ms = Some(latency);
            } else {
                state.status = message.clone();
            }

            if message.starts_with("biomart.request") {
                state.request_count = state.request_count.saturating_add(1);
            }

            push_bounded(&mut state.events, message.clone(), EVENTS_MAX);
            push_bounded(
                &mut state.logs,
                format!("[{}] {message}", timestamp()),
                LOGS_MAX,
            );
        }
    }
}

impl Tui {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            species: format!(
                "{} -> {}",
                config.reference.dataset.species(),
                config.target.dataset.species()
            ),
            state: Arc::new(Mutex::new(AppState {
                status: "ready".to_string(),
                phase: Phase::Prepare,
                latency_ms: None,
                request_count: 0,
                events: VecDeque::new(),
                logs: VecDeque::new(),
                summary: None,
                started: Instant::now(),
                active: false,
            })),
        }
    }

    /// Runs `f` on a worker thread while drawing its progress events.
    /// `q` or `Esc` leaves the screen and reports the run as aborted.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, KiraError> + Send + 'static,
        R: Send + 'static,
    {
        self.set_active(true);

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, &self.species, &state, tick))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                self.set_active(false);
                leave_screen()?;
                handle.join().ok();
                return result.map_err(miette::Report::new);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if is_quit(key) {
                        break;
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }

        self.set_active(false);
        leave_screen()?;
        Err(miette::Report::msg("aborted"))
    }

    /// Shows the final summary until a key is pressed.
    pub fn finish_run(&mut self, summary: &RunSummary) -> miette::Result<()> {
        if let Ok(mut state) = self.state.lock() {
            state.summary = Some(summary.clone());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;

        loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, &self.species, &state, 0))
                    .into_diagnostic()?;
            }
            if event::poll(Duration::from_millis(200)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }

        leave_screen()
    }

    fn set_active(&self, active: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
            if active {
                state.started = Instant::now();
            }
        }
    }
}

fn leave_screen() -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
    Ok(())
}

fn is_quit(key: KeyEvent) -> bool {
    key.kind == KeyEventKind::Press && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
}

fn draw_ui(frame: &mut ratatui::Frame, species: &str, state: &AppState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(8),
            Constraint::Length(11),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(species, state, tick), chunks[0]);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);
    frame.render_widget(draw_status_panel(state), main[0]);
    frame.render_widget(draw_summary_panel(state), main[1]);
    frame.render_widget(draw_logs_view(state), chunks[2]);
}

fn draw_header(species: &str, state: &AppState, tick: usize) -> Paragraph<'static> {
    let hb = if state.active && tick % 2 == 0 {
        "*"
    } else {
        " "
    };
    let header_line = Line::from(vec![
        Span::styled(
            "KIRA-ORTHO",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw(format!("   Species: {species}   Service: BioMart   ")),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]);
    Paragraph::new(vec![header_line])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_status_panel(state: &AppState) -> Paragraph<'static> {
    let progress = phase_progress(state.phase, state.summary.is_some());
    let phase_color = if state.summary.is_some() {
        Color::Green
    } else if state.active {
        Color::Cyan
    } else {
        Color::Yellow
    };
    let latency = state
        .latency_ms
        .map(|v| format!("{v} ms"))
        .unwrap_or_else(|| "--".to_string());
    let mut lines = vec![
        Line::from(Span::styled(
            "STATUS / PROGRESS",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Phase: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:<8} ", state.phase.label()),
                Style::default().fg(phase_color),
            ),
            Span::raw(progress_bar(progress)),
            Span::raw(format!(" {:>3}%", progress)),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::raw(state.status.clone()),
        ]),
        Line::from(vec![
            Span::styled("Requests: ", Style::default().fg(Color::Gray)),
            Span::raw(state.request_count.to_string()),
            Span::styled("   Last latency: ", Style::default().fg(Color::Gray)),
            Span::raw(latency),
            Span::styled("   Elapsed: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}s", state.started.elapsed().as_secs())),
        ]),
        Line::from(Span::styled(
            "Recent events:",
            Style::default().fg(Color::Gray),
        )),
    ];
    for event in state.events.iter().rev().take(3) {
        lines.push(Line::from(format!("- {event}")));
    }

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::RIGHT))
        .wrap(Wrap { trim: true })
}

fn draw_summary_panel(state: &AppState) -> Paragraph<'static> {
    let mut lines = vec![Line::from(Span::styled(
        "RESULT",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];
    match &state.summary {
        Some(summary) => {
            lines.push(Line::from(format!(
                "Input rows: {} ({} without Entrez ID)",
                summary.input_rows, summary.unresolved_rows
            )));
            lines.push(Line::from(format!(
                "Homology rows: {} -> {} with Entrez IDs",
                summary.homology_rows, summary.augmented_rows
            )));
            lines.push(Line::from(format!("Output rows: {}", summary.output_rows)));
            lines.push(Line::from(format!("Output: {}", summary.output_path)));
            lines.push(Line::from(format!(
                "Lookup: {}",
                summary.homology_lookup_path
            )));
            for warning in &summary.warnings {
                lines.push(Line::from(Span::styled(
                    format!("Warning: {warning}"),
                    Style::default().fg(Color::Yellow),
                )));
            }
            lines.push(Line::from(Span::styled(
                "Press any key to exit",
                Style::default().fg(Color::Gray),
            )));
        }
        None => lines.push(Line::from(Span::styled(
            "running... (q to abort)",
            Style::default().fg(Color::Gray),
        ))),
    }
    Paragraph::new(lines).wrap(Wrap { trim: true })
}

fn draw_logs_view(state: &AppState) -> Paragraph<'static> {
    let visible = 9usize;
    let start = state.logs.len().saturating_sub(visible);
    let mut lines = Vec::with_capacity(visible + 1);
    lines.push(Line::from(Span::styled(
        "LOGS",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    for line in state.logs.iter().skip(start) {
        lines.push(Line::from(line.clone()));
    }
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true })
}

fn phase_progress(phase: Phase, finished: bool) -> u8 {
    if finished {
        return 100;
    }
    ((phase.index() as f64 / 5.0) * 100.0) as u8
}

fn progress_bar(percent: u8) -> String {
    let total = 10;
    let filled = (percent as usize * total) / 100;
    let mut out = String::from("[");
    for i in 0..total {
        out.push(if i < filled { '#' } else { '.' });
    }
    out.push(']');
    out
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    let rest = message.strip_prefix("phase=")?;
    let (label, payload) = rest.split_once(';')?;
    let phase = match label {
        "Prepare" => Phase::Prepare,
        "Fetch" => Phase::Fetch,
        "Join" => Phase::Join,
        "Annotate" => Phase::Annotate,
        "Store" => Phase::Store,
        _ => return None,
    };
    Some((phase, payload.trim()))
}

fn parse_latency(message: &str) -> Option<u128> {
    message
        .split("latency_ms=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<u128>().ok())
}

fn push_bounded(buffer: &mut VecDeque<String>, item: String, max: usize) {
    buffer.push_back(item);
    while buffer.len() > max {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
