//! # Splitmux
//!
//! Run several shell commands side by side in one terminal.
//!
//! A layout tree of horizontal and vertical splits is mapped onto the screen;
//! every leaf becomes a pane running one command in its own PTY. The session
//! keeps processes alive across resizes, restarts them when asked, watches
//! their output for error patterns and quits once every command is done.
//!
//! ## Features
//!
//! - **Split Layouts**: Nested horizontal/vertical splits with absolute,
//!   fractional, ratio and percentage sizes
//! - **PTY Management**: Commands run through the platform shell via `portable-pty`
//! - **Terminal Emulation**: Full VT100/ANSI emulation with scrollback via `vt100`
//! - **Prefix Keys**: `Ctrl+<activator>` commands for focus, zoom, scroll and restart
//! - **Error Monitoring**: Regex patterns with desktop/bell notifications
//! - **Ratatui Integration**: Widgets for rendering the whole session
//!
//! ## Example
//!
//! ```no_run
//! use ratatui::layout::Rect;
//! use splitmux::{LayoutNode, PaneSpec, Session, SessionConfig, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> splitmux::Result<()> {
//!     let layout = LayoutNode::horizontal(vec![
//!         LayoutNode::pane(PaneSpec::new("cargo watch -x check").focus()),
//!         LayoutNode::pane(PaneSpec::new("cargo test").title("tests")),
//!     ]);
//!
//!     let mut session = Session::new(SessionConfig::default());
//!     session.initial_provision(layout, Rect::new(0, 0, 120, 40))?;
//!
//!     while let Some(event) = session.next_event().await {
//!         if session.handle_event(event) == splitmux::Flow::Quit {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod input;
mod layout;
mod lifecycle;
mod monitor;
mod navigate;
mod notify;
mod pane;
mod pty;
mod session;
mod widget;

// Re-export public API
pub use config::{SessionConfig, DEFAULT_ERROR_PATTERNS};
pub use error::{Error, Result};
pub use input::{key_to_bytes, Action, InputContext, InputDispatcher, InputMode, Scroll};
pub use layout::{Axis, LayoutCalculator, LayoutNode, PaneSpec, SizeSpec, MIN_PANE_SIZE};
pub use lifecycle::{ExitAction, Lifecycle, ProcessState, Terminations, WaitPolicy};
pub use monitor::{ErrorMonitor, MonitorReport, PatternList};
pub use navigate::{navigate, Direction};
pub use notify::{Notification, NotificationMethods, Notifier, TerminalNotifier};
pub use pane::{PaneSize, PaneState};
pub use pty::{PaneEvent, PaneProcess, PtySpawner, SpawnRequest, Spawner};
pub use session::{Flow, Session, SessionEvent, SessionState};
pub use widget::{pane_title, HelpOverlay, PaneWidget, SessionWidget};
