//! Run every command-line argument in its own pane, side by side.
//!
//! Run with: cargo run --example splitmux -- "htop" "tail -f /var/log/syslog"
//!
//! Controls:
//! - Ctrl+A ?: Show the key bindings
//! - Ctrl+A k: Kill every command and quit
//! - All other input goes to the focused pane
//!
//! Environment:
//! - `SPLITMUX_LOG=<file>`: write tracing output to a file
//! - `SPLITMUX_WAIT=never|on-error|always`: what to do once every command is done
//! - `SPLITMUX_NOTIFY=beep,system`: how to report detected errors

use std::io::{self, stdout};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use splitmux::{
    Flow, LayoutNode, PaneSpec, Session, SessionConfig, SessionEvent, SessionWidget,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> io::Result<()> {
    let commands: Vec<String> = std::env::args().skip(1).collect();
    if commands.is_empty() {
        eprintln!("usage: splitmux <command> [<command>...]");
        std::process::exit(2);
    }

    init_logging();
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("splitmux: {e}");
            std::process::exit(2);
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, config, &commands);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("splitmux: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging() {
    let Ok(path) = std::env::var("SPLITMUX_LOG") else {
        return;
    };
    match std::fs::File::create(&path) {
        Ok(file) => {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("splitmux=debug"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => eprintln!("splitmux: cannot open log file {path}: {e}"),
    }
}

fn load_config() -> Result<SessionConfig, String> {
    let mut config = SessionConfig::default().mouse(true);
    if let Ok(wait) = std::env::var("SPLITMUX_WAIT") {
        config = config.wait(wait.parse()?);
    }
    if let Ok(notify) = std::env::var("SPLITMUX_NOTIFY") {
        config = config.notify(notify.parse()?);
    }
    Ok(config)
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: SessionConfig,
    commands: &[String],
) -> splitmux::Result<()> {
    let layout = LayoutNode::horizontal(
        commands
            .iter()
            .map(|command| LayoutNode::pane(PaneSpec::new(command.as_str())))
            .collect(),
    );

    let size = terminal.size()?;
    let mut session = Session::new(config);
    session.initial_provision(layout, Rect::new(0, 0, size.width, size.height))?;

    let mut last_tick = Instant::now();

    // Main event loop
    loop {
        if session.take_redraw() {
            terminal.clear()?;
        }
        if session.take_dirty() {
            terminal.draw(|frame| {
                frame.render_widget(SessionWidget::new(&session), frame.area());
            })?;
        }

        // Handle terminal events with a short timeout for responsive updates
        let mut flow = Flow::Continue;
        if event::poll(Duration::from_millis(16))? {
            let event = match event::read()? {
                Event::Key(key) => Some(SessionEvent::Key(key)),
                Event::Mouse(mouse) => Some(SessionEvent::Mouse(mouse)),
                Event::Resize(width, height) => {
                    Some(SessionEvent::Resize(Rect::new(0, 0, width, height)))
                }
                _ => None,
            };
            if let Some(event) = event {
                flow = session.handle_event(event);
            }
        }

        // Pane output, exits and timers
        for event in session.poll_events() {
            if session.handle_event(event) == Flow::Quit {
                flow = Flow::Quit;
            }
        }

        if last_tick.elapsed() >= session.tick_interval() {
            last_tick = Instant::now();
            session.handle_event(SessionEvent::Tick);
        }

        if flow == Flow::Quit {
            break;
        }
    }

    Ok(())
}
