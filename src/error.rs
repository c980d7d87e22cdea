//! Error types for the splitmux crate.

use thiserror::Error;

/// Result type alias using splitmux's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in splitmux operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the host terminal or a PTY.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anyhow error from portable-pty.
    #[error("PTY error: {0}")]
    Pty(#[from] anyhow::Error),

    /// Failed to create PTY pair.
    #[error("failed to create PTY: {0}")]
    PtyCreate(String),

    /// The pane's process is gone.
    #[error("pane has been closed")]
    PaneClosed,

    /// More than one pane in the layout requested the initial focus.
    #[error("only a single command can be focused")]
    MultipleFocus,

    /// A split node without children.
    #[error("split without any panes")]
    EmptySplit,

    /// The screen cannot give every pane its minimum size.
    #[error("terminal too small: {available} cells available, {required} required")]
    TerminalTooSmall {
        /// Cells available along the split axis.
        available: u16,
        /// Cells needed to give every child the minimum size.
        required: u32,
    },

    /// A pane size specification could not be parsed.
    #[error("invalid size specification: {0:?}")]
    InvalidSize(String),

    /// An error pattern is not a valid regular expression.
    #[error("invalid error pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern item.
        pattern: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// PTY resize failed.
    #[error("failed to resize PTY: {0}")]
    Resize(String),

    /// Input send failed.
    #[error("failed to send input to pane")]
    InputSend,

    /// The session already has panes.
    #[error("session already provisioned")]
    AlreadyProvisioned,
}
