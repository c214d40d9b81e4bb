//! Real-time IMU chart and recorder.
//!
//! Usage:
//!   cargo run --bin tui                       # connect to the first IMU peripheral found
//!   cargo run --bin tui -- --simulate         # built-in signal generator, no hardware needed
//!   cargo run --bin tui -- -l walk -o data/   # preset label and output directory
//!
//! Keys
//! ----
//!   c        connect
//!   d        disconnect
//!   r        start / stop recording
//!   l        edit the activity label (Enter to apply, Esc to cancel)
//!   s        save the last recording as CSV
//!   x        clear the chart
//!   q / Esc  quit

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};
use tokio::sync::{mpsc, oneshot};

use imu_collect::config::Args;
use imu_collect::display::format_readout;
use imu_collect::imu_client::{ImuClient, ImuClientConfig};
use imu_collect::link::Link;
use imu_collect::protocol::{AXIS_LABELS, AXIS_NAMES};
use imu_collect::session::{now_ms, SaveOutcome, Session};
use imu_collect::simulate::spawn_simulator;
use imu_collect::types::{ConnectionState, ImuEvent};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Line colours in channel order.
const COLORS: [Color; 6] = [
    Color::Rgb(255, 99, 132),  // accel x
    Color::Rgb(54, 162, 235),  // accel y
    Color::Rgb(75, 192, 192),  // accel z
    Color::Rgb(255, 206, 86),  // gyro x
    Color::Rgb(153, 102, 255), // gyro y
    Color::Rgb(255, 159, 64),  // gyro z
];

/// Braille spinner frames cycled at ~100 ms intervals while connecting.
const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

// ── App state (shared with the event task via Arc<Mutex<_>>) ──────────────────

struct App {
    session: Session,
    /// `Some` while the label editor is open; holds the text being typed.
    label_edit: Option<String>,
    /// Last save result or alert, shown in the footer.
    notice: Option<(String, Color)>,
    simulate: bool,
}

impl App {
    fn new(simulate: bool) -> Self {
        Self {
            session: Session::new(),
            label_edit: None,
            notice: None,
            simulate,
        }
    }
}

// ── Connection helpers ────────────────────────────────────────────────────────

/// Kick off a connect attempt in the background and return immediately.
///
/// Progress is written into `app.session` through the client's status
/// callback; the oneshot resolves to the new link, or `None` on failure.
fn start_connect(
    app: Arc<Mutex<App>>,
    config: ImuClientConfig,
    sim_rate: f64,
) -> oneshot::Receiver<Option<(mpsc::Receiver<ImuEvent>, Link)>> {
    let (tx, rx) = oneshot::channel();

    {
        let mut s = app.lock().unwrap();
        s.notice = None;
        s.session.clear_view();
        if s.simulate {
            s.session.on_status(ConnectionState::Connecting, "Starting simulator...");
            drop(s);
            let (evt_rx, sim) = spawn_simulator(sim_rate);
            let _ = tx.send(Some((evt_rx, Link::Simulated(sim))));
            return rx;
        }
        s.session
            .on_status(ConnectionState::Discovering, "Requesting Bluetooth Device...");
    }

    let status_app = Arc::clone(&app);
    let client = ImuClient::new(config).with_status_callback(Arc::new(
        move |state: ConnectionState, msg: &str| {
            status_app.lock().unwrap().session.on_status(state, msg);
        },
    ));

    tokio::spawn(async move {
        match client.connect().await {
            Ok((evt_rx, handle)) => {
                let _ = tx.send(Some((evt_rx, Link::Ble(handle))));
            }
            Err(e) => {
                log::warn!("connect failed: {e}");
                let _ = tx.send(None);
            }
        }
    });

    rx
}

/// Forward link events into the session until the link goes away.
///
/// This is the single place a disconnect reaches the session, whether the
/// peripheral dropped the link or the user asked for it.
fn spawn_event_task(mut rx: mpsc::Receiver<ImuEvent>, app: Arc<Mutex<App>>) {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let mut s = app.lock().unwrap();
            match ev {
                ImuEvent::Connected(name) => s.session.on_connected(&name),
                ImuEvent::Sample(sample) => s.session.on_sample(sample, now_ms()),
                ImuEvent::Disconnected => break,
            }
        }
        // Reached on Disconnected and when teardown closed the channel.
        let mut s = app.lock().unwrap();
        s.session.on_disconnected();
        s.label_edit = None;
    });
}

/// Disconnect and release `link` without blocking the UI loop.
fn release(link: Link) {
    tokio::spawn(async move {
        if let Err(e) = link.disconnect().await {
            log::warn!("disconnect failed: {e}");
        }
        link.teardown().await;
    });
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn draw(frame: &mut Frame, app: &App) {
    let root = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(4),
    ])
    .split(frame.area());

    draw_header(frame, root[0], app);
    draw_readout(frame, root[1], app);

    let charts = Layout::vertical([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)]).split(root[2]);
    draw_chart(frame, charts[0], app, " Accelerometer (g) ", 0..3);
    draw_chart(frame, charts[1], app, " Gyroscope (°/s) ", 3..6);

    draw_footer(frame, root[3], app);
}

fn spinner_str() -> &'static str {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    SPINNER[(ms / 100) as usize % SPINNER.len()]
}

#[inline]
fn sep<'a>() -> Span<'a> {
    Span::styled(" │ ", Style::default().fg(Color::DarkGray))
}

/// Status line, device, sample rate and recording badge.
fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let s = &app.session;
    let (label, color) = match s.state() {
        ConnectionState::Connected => {
            let color = if s.recorder().is_armed() { Color::Red } else { Color::Green };
            (format!("● {}", s.status()), color)
        }
        ConnectionState::Disconnected if s.status().starts_with("Error") => {
            (s.status().to_owned(), Color::Red)
        }
        ConnectionState::Disconnected => (s.status().to_owned(), Color::DarkGray),
        _ => (format!("{} {}", spinner_str(), s.status()), Color::Yellow),
    };

    let device = s.device().unwrap_or("no device").to_owned();
    let rate = format!("{:.1} Hz", s.rate().rate());
    let total = format!("{} smp", s.rate().total());

    let mut spans = vec![
        Span::styled(
            " IMU Collect ",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        sep(),
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        sep(),
        Span::styled(device, Style::default().fg(Color::White)),
        sep(),
        Span::styled(rate, Style::default().fg(Color::White)),
        sep(),
        Span::styled(total, Style::default().fg(Color::DarkGray)),
    ];
    if s.recorder().is_armed() {
        spans.push(sep());
        spans.push(Span::styled(
            format!("⏺ REC {}", s.recorder().len()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

/// Latest sample as six fixed-precision values.
fn draw_readout(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::raw(" ")];
    match app.session.latest() {
        Some(sample) => {
            for (i, value) in format_readout(sample).into_iter().enumerate() {
                spans.push(Span::styled(
                    format!("{}:", AXIS_NAMES[i]),
                    Style::default().fg(Color::DarkGray),
                ));
                spans.push(Span::styled(
                    format!("{value:>10}  "),
                    Style::default().fg(COLORS[i]).add_modifier(Modifier::BOLD),
                ));
            }
        }
        None => spans.push(Span::styled(
            "waiting for data…",
            Style::default().fg(Color::DarkGray),
        )),
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

/// One chart over the rolling window for `channels`.
fn draw_chart(frame: &mut Frame, area: Rect, app: &App, title: &str, channels: std::ops::Range<usize>) {
    let window = app.session.window();
    let series: Vec<(usize, Vec<(f64, f64)>)> =
        channels.clone().map(|ch| (ch, window.series(ch))).collect();

    let datasets: Vec<Dataset> = series
        .iter()
        .map(|(ch, data)| {
            Dataset::default()
                .name(AXIS_LABELS[*ch])
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(COLORS[*ch]))
                .data(data)
        })
        .collect();

    let chs: Vec<usize> = channels.collect();
    let [y_lo, y_hi] = window.y_bounds(&chs);
    let y_labels: Vec<String> = [y_lo, (y_lo + y_hi) / 2.0, y_hi]
        .iter()
        .map(|v| format!("{v:+.2}"))
        .collect();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled(
                    title.to_owned(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .bounds(window.x_bounds())
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([y_lo, y_hi])
                .labels(y_labels)
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}

#[inline]
fn key(s: &str) -> Span<'_> {
    Span::styled(
        s,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

/// Key hints (only enabled controls are highlighted), label, and last notice.
fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let c = app.session.controls();
    let hint = |enabled: bool, k: &'static str, text: &'static str| -> Vec<Span<'static>> {
        if enabled {
            vec![key(k), Span::raw(text)]
        } else {
            vec![
                Span::styled(k, Style::default().fg(Color::DarkGray)),
                Span::styled(text, Style::default().fg(Color::DarkGray)),
            ]
        }
    };
    let record_text = if app.session.recorder().is_armed() {
        "Stop  "
    } else {
        "Record  "
    };

    let mut keys = vec![Span::raw(" ")];
    keys.extend(hint(c.connect, "[c]", "Connect  "));
    keys.extend(hint(c.disconnect, "[d]", "Disconnect  "));
    keys.extend(hint(c.record, "[r]", record_text));
    keys.extend(hint(c.label_edit, "[l]", "Label  "));
    keys.extend(hint(c.save, "[s]", "Save  "));
    keys.extend(hint(true, "[x]", "Clear  "));
    keys.extend(hint(true, "[q]", "Quit"));

    let label_line = match &app.label_edit {
        Some(text) => Line::from(vec![
            Span::styled(" Label: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{text}▏"),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (Enter apply, Esc cancel)", Style::default().fg(Color::DarkGray)),
        ]),
        None => {
            let label = app.session.label().trim();
            let shown = if label.is_empty() { "(none)" } else { label };
            let mut spans = vec![
                Span::styled(" Label: ", Style::default().fg(Color::DarkGray)),
                Span::styled(shown.to_owned(), Style::default().fg(Color::Cyan)),
            ];
            if let Some((msg, color)) = &app.notice {
                spans.push(Span::raw("   "));
                spans.push(Span::styled(msg.clone(), Style::default().fg(*color)));
            }
            Line::from(spans)
        }
    };

    frame.render_widget(
        Paragraph::new(vec![Line::from(keys), label_line]).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    use std::io::IsTerminal as _;
    if !io::stdout().is_terminal() {
        eprintln!("Error: imu-collect tui requires a real terminal (TTY).");
        eprintln!("Run it directly in a terminal emulator, not piped or redirected.");
        std::process::exit(1);
    }

    // ── Logging ─────────────────────────────────────────────────────────────
    // Logs go to imu-tui.log so they never interfere with the display.
    //   RUST_LOG=debug cargo run --bin tui
    {
        use std::fs::File;
        if let Ok(file) = File::create("imu-tui.log") {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        }
    }

    let args = Args::parse();
    let config = args.client_config();
    let out_dir: PathBuf = args.out_dir.clone();

    let app = Arc::new(Mutex::new(App::new(args.simulate)));
    {
        let mut s = app.lock().unwrap();
        s.session.set_label(&args.label);
        s.session.set_auto_record(args.record);
    }

    // ── Session state (owned by main task only) ───────────────────────────────
    let mut link: Option<Link> = None;
    let mut pending_connect = Some(start_connect(Arc::clone(&app), config.clone(), args.sim_rate));

    // ── Terminal setup ────────────────────────────────────────────────────────
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    let tick = Duration::from_millis(33); // ~30 FPS

    // ── Main loop ─────────────────────────────────────────────────────────────
    'main: loop {
        // ── 1. Collect finished connection attempt ────────────────────────────
        if let Some(ref mut rx) = pending_connect {
            if let Ok(result) = rx.try_recv() {
                pending_connect = None;
                if let Some((evt_rx, l)) = result {
                    // A link dropped since the last pass may still be in the slot.
                    Link::replace(&mut link, l);
                    spawn_event_task(evt_rx, Arc::clone(&app));
                }
            }
        }

        // ── 2. Release a link the peripheral dropped ──────────────────────────
        {
            let dropped = app.lock().unwrap().session.state() == ConnectionState::Disconnected;
            if dropped && pending_connect.is_none() {
                if let Some(l) = link.take() {
                    tokio::spawn(l.teardown());
                }
            }
        }

        // ── 3. Render ─────────────────────────────────────────────────────────
        {
            let s = app.lock().unwrap();
            terminal.draw(|f| draw(f, &s))?;
        }

        // ── 4. Handle keyboard ────────────────────────────────────────────────
        if !event::poll(tick)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };

        // In raw mode Ctrl+C arrives as a key event.
        let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if ctrl_c {
            break 'main;
        }

        // ── Label editor keys ─────────────────────────────────────────────────
        {
            let mut s = app.lock().unwrap();
            if let Some(text) = s.label_edit.as_mut() {
                match key.code {
                    KeyCode::Char(ch) => text.push(ch),
                    KeyCode::Backspace => {
                        text.pop();
                    }
                    KeyCode::Enter => {
                        let text = s.label_edit.take().unwrap_or_default();
                        s.session.set_label(&text);
                    }
                    KeyCode::Esc => s.label_edit = None,
                    _ => {}
                }
                continue;
            }
        }

        // ── Normal keys ───────────────────────────────────────────────────────
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break 'main,

            KeyCode::Char('c') => {
                if app.lock().unwrap().session.controls().connect && pending_connect.is_none() {
                    pending_connect =
                        Some(start_connect(Arc::clone(&app), config.clone(), args.sim_rate));
                }
            }

            KeyCode::Char('d') => {
                if let Some(l) = link.take() {
                    release(l);
                }
            }

            KeyCode::Char('r') => {
                let mut s = app.lock().unwrap();
                if s.session.controls().record {
                    s.session.toggle_recording();
                    s.notice = None;
                }
            }

            KeyCode::Char('l') => {
                let mut s = app.lock().unwrap();
                if s.session.controls().label_edit {
                    s.label_edit = Some(s.session.label().to_owned());
                }
            }

            KeyCode::Char('s') => {
                let mut s = app.lock().unwrap();
                s.notice = Some(match s.session.save(&out_dir) {
                    Ok(SaveOutcome::Saved(path)) => (format!("Saved {}", path.display()), Color::Green),
                    Ok(SaveOutcome::Alert(msg)) => (msg, Color::Yellow),
                    Err(e) => {
                        log::error!("save failed: {e}");
                        (format!("Save failed: {e}"), Color::Red)
                    }
                });
            }

            KeyCode::Char('x') => {
                app.lock().unwrap().session.clear_view();
            }

            _ => {}
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────────
    if let Some(l) = link {
        let _ = l.disconnect().await;
        l.teardown().await;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
