mod help;
mod state;

use crate::cli::Cli;
use crate::model::{Regime, RunConfig, SessionEvent, Speed};
use crate::session::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// How long to wait for the session loop after the UI quits. A blocking run never yields,
/// so past this the process exits without it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub async fn run(args: Cli, program: String, cfg: RunConfig) -> Result<()> {
    // Unbounded channels avoid backpressure and task switching in the hot path.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let program_name = args.program_name();
    let ui_handle = std::thread::spawn(move || run_threaded(program_name, event_rx, cmd_tx));

    let controller = tokio::spawn(session::run_controller(program, cfg, event_tx, cmd_rx));

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    let ui_res = match join_res {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(anyhow::anyhow!("join TUI thread: {e}")),
    };

    match tokio::time::timeout(SHUTDOWN_GRACE, controller).await {
        Ok(joined) => joined.context("session task failed")??,
        Err(_) => {
            warn!("session still busy in a blocking run; exiting without it");
            if let Err(e) = ui_res {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
            std::process::exit(0);
        }
    }

    ui_res
}

/// What a key press asks for.
#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    None,
    Send(UiCommand),
    Copy,
    Quit,
}

fn handle_key(state: &mut UiState, k: KeyEvent) -> KeyAction {
    if state.inject_pending {
        state.inject_pending = false;
        return match k.code {
            KeyCode::Char(c) => {
                state.info = format!("Injected {c:?}");
                KeyAction::Send(UiCommand::Inject(c))
            }
            _ => {
                state.info = "Injection cancelled".into();
                KeyAction::None
            }
        };
    }

    match (k.modifiers, k.code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => KeyAction::Quit,
        (_, KeyCode::Enter) => {
            state.reset_run();
            state.info = "Started".into();
            KeyAction::Send(UiCommand::Start)
        }
        (_, KeyCode::Esc) => {
            state.info = "Stopped".into();
            KeyAction::Send(UiCommand::Stop)
        }
        (_, KeyCode::Char('n')) => KeyAction::Send(UiCommand::Step),
        (_, KeyCode::Up) => KeyAction::Send(UiCommand::SetSpeed(state.nudged_speed(10))),
        (_, KeyCode::Down) => KeyAction::Send(UiCommand::SetSpeed(state.nudged_speed(-10))),
        (_, KeyCode::Right) => KeyAction::Send(UiCommand::SetSpeed(state.nudged_speed(1))),
        (_, KeyCode::Left) => KeyAction::Send(UiCommand::SetSpeed(state.nudged_speed(-1))),
        (_, KeyCode::Char('p')) => KeyAction::Send(UiCommand::SetSpeed(Speed::IDLE)),
        (_, KeyCode::Char('g')) => KeyAction::Send(UiCommand::SetSpeed(Speed::BLOCKING)),
        (_, KeyCode::Char('i')) => {
            state.inject_pending = true;
            state.info = "Type an instruction to inject (Esc cancels)".into();
            KeyAction::None
        }
        (_, KeyCode::Char('y')) => KeyAction::Copy,
        (_, KeyCode::Char('?')) => {
            state.show_help = !state.show_help;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    program_name: String,
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        program_name,
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key(&mut state, k) {
                    KeyAction::None => {}
                    KeyAction::Send(cmd) => {
                        let _ = cmd_tx.send(cmd);
                    }
                    KeyAction::Copy => match copy_to_clipboard(&state.output_text()) {
                        Ok(()) => {
                            state.info =
                                format!("✓ Copied {} bytes of output", state.output.len());
                        }
                        Err(e) => {
                            state.info = format!("Clipboard copy failed: {e:#}");
                        }
                    },
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Session"), Line::from("Help")])
        .select(usize::from(state.show_help))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("bf-stepper: {}", state.program_name)),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    if state.show_help {
        help::draw_help(chunks[1], f);
    } else {
        draw_session(chunks[1], f, state);
    }
}

fn draw_session(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(6)].as_ref())
        .split(area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(main[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)].as_ref())
        .split(cols[1]);

    draw_program(cols[0], f, state);
    draw_tape(right[0], f, state);
    draw_output(right[1], f, state);
    draw_status(main[1], f, state);
}

/// Program text split into display lines, with the character at `pc` highlighted.
/// Returns the lines and the index of the line holding `pc`.
fn program_lines(text: &str, pc: usize, reached_end: bool) -> (Vec<Line<'static>>, usize) {
    let pc_style = Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();
    let mut pc_line = 0;
    let mut pos = 0;

    for raw in text.split('\n') {
        let chars: Vec<char> = raw.chars().collect();
        let line_start = pos;
        let line_end = pos + chars.len();
        if !reached_end && (line_start..line_end).contains(&pc) {
            let at = pc - line_start;
            let before: String = chars[..at].iter().collect();
            let after: String = chars[at + 1..].iter().collect();
            lines.push(Line::from(vec![
                Span::raw(before),
                Span::styled(chars[at].to_string(), pc_style),
                Span::raw(after),
            ]));
            pc_line = lines.len() - 1;
        } else {
            lines.push(Line::from(raw.to_string()));
        }
        // newline
        pos = line_end + 1;
    }
    if reached_end {
        pc_line = lines.len().saturating_sub(1);
    }
    (lines, pc_line)
}

fn draw_program(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let Some(engine) = state.last.engine.as_ref() else {
        let p = Paragraph::new("No active session. Press Enter to start.")
            .block(Block::default().borders(Borders::ALL).title("Program"));
        f.render_widget(p, area);
        return;
    };

    let (lines, pc_line) = program_lines(
        &engine.program,
        engine.program_counter,
        engine.reached_end,
    );
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = pc_line.saturating_sub(visible / 2) as u16;

    let title = match crate::engine::instruction_at(&engine.program, engine.program_counter) {
        Some(c) if !engine.reached_end => format!("Program (pc {} {c:?})", engine.program_counter),
        _ => format!("Program (pc {} end)", engine.program_counter),
    };
    let p = Paragraph::new(lines)
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_tape(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Tape");
    let Some(engine) = state.last.engine.as_ref() else {
        f.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    // cells of width 5 that fit between the borders, centred on the pointer
    let fit = (area.width.saturating_sub(2) / 5).max(1) as usize;
    let at = engine.pointer.saturating_sub(engine.tape_start);
    let skip = at.saturating_sub(fit / 2).min(engine.tape.len().saturating_sub(fit));

    let mut idx_spans = Vec::new();
    let mut val_spans = Vec::new();
    for (offset, value) in engine.tape.iter().enumerate().skip(skip).take(fit) {
        let idx = engine.tape_start + offset;
        let style = if idx == engine.pointer {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        idx_spans.push(Span::styled(format!("{:>5}", idx), Style::default().fg(Color::Gray)));
        val_spans.push(Span::styled(format!("{:>5}", value), style));
    }

    let lines = vec![
        Line::from(idx_spans),
        Line::from(val_spans),
        Line::from(vec![
            Span::styled("ptr: ", Style::default().fg(Color::Gray)),
            Span::raw(engine.pointer.to_string()),
        ]),
    ];
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_output(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let text = state.output_text();
    let line_count = text.lines().count();
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = line_count.saturating_sub(visible) as u16;

    let p = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title("Output"));
    f.render_widget(p, area);
}

fn speed_label(speed: Speed) -> String {
    match (speed.regime(), speed.cadence()) {
        (Regime::Stepped, Some(period)) => {
            format!("{speed} ({:.2} ms/step)", period.as_secs_f64() * 1000.0)
        }
        (Regime::Blocking, _) => "super".to_string(),
        _ => format!("{speed} (idle)"),
    }
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let snap = &state.last;
    let steps = snap.engine.as_ref().map(|e| e.steps).unwrap_or(0);

    let status_style = if snap.faulted {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    };
    let mut status_spans = vec![Span::styled("Status: ", Style::default().fg(Color::Gray))];
    match &snap.status {
        Some(msg) => status_spans.push(Span::styled(msg.clone(), status_style)),
        None if snap.active => status_spans.push(Span::raw("running")),
        None => status_spans.push(Span::raw("stopped")),
    }
    if let (Some(engine), Some(profile)) = (snap.engine.as_ref(), snap.profile.as_deref()) {
        if let Some(hot) = crate::text_summary::hot_spots(&engine.program, profile, 1).first() {
            status_spans.push(Span::raw(format!(
                "  (hottest: {:?} at {} x{})",
                hot.instruction, hot.position, hot.count
            )));
        }
    }

    let lines = vec![
        Line::from(vec![
            Span::styled("Speed: ", Style::default().fg(Color::Gray)),
            Span::raw(speed_label(snap.speed)),
            Span::styled("  Steps: ", Style::default().fg(Color::Gray)),
            Span::raw(steps.to_string()),
            Span::styled("  Elapsed: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{:.3} s", snap.elapsed.as_secs_f64())),
        ]),
        Line::from(status_spans),
        Line::from(vec![
            Span::styled("Info: ", Style::default().fg(Color::Gray)),
            Span::raw(state.info.clone()),
        ]),
        Line::from(
            "Keys: Enter start | Esc stop | n step | ↑↓←→ speed | p pause | g super | i inject | ? help | q quit",
        ),
    ];

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Session"));
    f.render_widget(p, area);
}

// Global clipboard manager channel - initialized once on first use
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;

static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Initialize the clipboard manager thread if not already initialized.
/// Each clipboard instance is kept alive for a while so clipboard managers on Linux have time
/// to read the contents.
fn init_clipboard_manager() -> &'static std_mpsc::Sender<String> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(&text).is_ok() {
                            std::thread::sleep(Duration::from_secs(2));
                        }
                    }
                    Err(e) => warn!(error = %e, "clipboard unavailable"),
                }
            }
        });

        tx
    })
}

/// Queue `text` for the clipboard without blocking the UI thread.
fn copy_to_clipboard(text: &str) -> Result<()> {
    init_clipboard_manager()
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))
}
