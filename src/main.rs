mod app;
mod ui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::App;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use fire_timeline::conditions::ConditionsClient;
use fire_timeline::config::{self, Config};
use fire_timeline::fetch::{self, Fetcher};
use fire_timeline::overlay::Category;
use fire_timeline::session::{Command, Session};
use ratatui::DefaultTerminal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Redraw cadence while idle
const FRAME: Duration = Duration::from_millis(50);
const DEFAULT_LOG: &str = "fire-timeline.log";

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let path = config::resolve_path(&args, std::env::var(config::PATH_ENV).ok());
    // Config problems are reported before the terminal is taken over
    let config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    init_logging(config.log_file.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_LOG)))?;
    info!(config = %path.display(), source = %config.source, "starting");

    let source = fetch::source_for(&config.source).context("building data source client")?;
    let conditions = config
        .conditions_url
        .as_deref()
        .map(ConditionsClient::new)
        .transpose()
        .context("building conditions client")?
        .map(Arc::new);
    let session = Session::new(&config, Fetcher::new(source, conditions))?;

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, session);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Log to a file; the terminal belongs to the UI
fn init_logging(path: PathBuf) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => {
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(),
        MouseEventKind::Down(MouseButton::Right) => app.inspect_at(mouse.column, mouse.row),
        _ => {}
    }
}

fn handle_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        // Timeline
        KeyCode::Left | KeyCode::Char(',') => app.dispatch(Command::Step(-1)),
        KeyCode::Right | KeyCode::Char('.') => app.dispatch(Command::Step(1)),
        KeyCode::Home => app.dispatch(Command::Seek(0)),
        KeyCode::End => app.dispatch(Command::Seek(usize::MAX)),
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            app.dispatch(Command::Seek(index));
        }
        KeyCode::Char(' ') => app.dispatch(Command::TogglePlay),

        // Overlays
        KeyCode::Char('g') => app.dispatch(Command::ToggleCategory(Category::Grid)),
        KeyCode::Char('p') => app.dispatch(Command::ToggleCategory(Category::Predicted)),
        KeyCode::Char('o') => app.dispatch(Command::ToggleCategory(Category::Observed)),
        KeyCode::Char('f') => app.dispatch(Command::CycleStageFilter),
        KeyCode::Char('s') => app.dispatch(Command::CycleStatusFilter),
        KeyCode::Char('L') => app.map_renderer.toggle_land(),
        KeyCode::Char('B') => app.map_renderer.toggle_bounds(),

        // Region and lookups
        KeyCode::Char('r') => app.dispatch(Command::NextRegion),
        KeyCode::Char('i') => app.inspect_center(),
        KeyCode::Tab => app.toggle_panel(),

        // View
        KeyCode::Char('h') => app.pan(-10, 0),
        KeyCode::Char('l') => app.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0, -8),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0, 8),
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),
        KeyCode::Char('0') => app.reset_view(),

        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, session: Session) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(session, size.width as usize, size.height as usize);
    app.start();

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        // Wake for the next playback tick if it comes before the next frame
        let now = Instant::now();
        let timeout = app
            .session
            .timeline()
            .until_tick(now)
            .map_or(FRAME, |d| d.min(FRAME));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(&mut app, key.code),
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        app.update(Instant::now());

        if app.should_quit {
            break;
        }
    }

    info!("shutting down");
    Ok(())
}
