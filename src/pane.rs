//! Pane registry entries and their runtime state.

use std::sync::{Arc, RwLock};

use ratatui::layout::Rect;

use crate::error::{Error, Result};
use crate::layout::PaneSpec;
use crate::lifecycle::ProcessState;
use crate::monitor::PatternList;
use crate::pty::PaneProcess;

/// Pane dimensions in rows and columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaneSize {
    /// Number of rows.
    pub rows: u16,
    /// Number of columns.
    pub cols: u16,
}

impl PaneSize {
    /// Create a new pane size.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Terminal size inside a bordered pane area.
    #[must_use]
    pub fn inside(area: Rect) -> Self {
        Self::new(
            area.height.saturating_sub(2).max(1),
            area.width.saturating_sub(2).max(1),
        )
    }
}

/// Runtime state of one leaf pane.
pub struct PaneState {
    /// 1-based display number.
    pub(crate) index: usize,
    /// The leaf this pane was provisioned from.
    pub(crate) spec: PaneSpec,
    /// Current area, border included.
    pub(crate) area: Rect,
    /// Emulated screen; survives process restarts.
    pub(crate) screen: Arc<RwLock<vt100::Parser>>,
    /// The current process, if one is running.
    pub(crate) process: Option<Box<dyn PaneProcess>>,
    /// Lifecycle state.
    pub(crate) status: ProcessState,
    /// Incremented on every spawn; stale exit events carry older values.
    pub(crate) generation: u64,
    /// Error patterns matched on the last scan.
    pub(crate) error: bool,
    /// Showing scrollback instead of live output.
    pub(crate) scrolling: bool,
    /// Output arrived since the last error scan.
    pub(crate) pending_update: bool,
    /// Termination counted against the shutdown policy: `Some(with_error)`.
    pub(crate) counted_exit: Option<bool>,
    /// Pane-local error patterns.
    pub(crate) local_patterns: PatternList,
}

impl PaneState {
    pub(crate) fn new(
        index: usize,
        spec: PaneSpec,
        area: Rect,
        scrollback: usize,
        local_patterns: PatternList,
    ) -> Self {
        let size = PaneSize::inside(area);
        Self {
            index,
            spec,
            area,
            screen: Arc::new(RwLock::new(vt100::Parser::new(size.rows, size.cols, scrollback))),
            process: None,
            status: ProcessState::Spawning,
            generation: 0,
            error: false,
            scrolling: false,
            pending_update: false,
            counted_exit: None,
            local_patterns,
        }
    }

    /// 1-based display number.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The pane's layout leaf.
    #[must_use]
    pub fn spec(&self) -> &PaneSpec {
        &self.spec
    }

    /// Current area, border included.
    #[must_use]
    pub fn area(&self) -> Rect {
        self.area
    }

    /// Lifecycle state.
    #[must_use]
    pub fn status(&self) -> &ProcessState {
        &self.status
    }

    /// Whether the last error scan flagged this pane.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Whether the pane is showing scrollback.
    #[must_use]
    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    /// Current process generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// OS process id of the running command.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Shared screen for rendering.
    pub(crate) fn screen(&self) -> &Arc<RwLock<vt100::Parser>> {
        &self.screen
    }

    /// Move/resize the pane, keeping its process and scrollback.
    ///
    /// # Errors
    /// Returns an error if the PTY resize fails.
    pub(crate) fn set_area(&mut self, area: Rect) -> Result<()> {
        if self.area == area {
            return Ok(());
        }
        self.area = area;
        let size = PaneSize::inside(area);
        self.screen
            .write()
            .expect("screen lock poisoned")
            .set_size(size.rows, size.cols);
        match &self.process {
            Some(process) => process.resize(size),
            None => Ok(()),
        }
    }

    /// Feed bytes into the screen as if the program had printed them.
    pub(crate) fn feed(&self, data: &[u8]) {
        self.screen.write().expect("screen lock poisoned").process(data);
    }

    /// Visible screen as plain text.
    #[must_use]
    pub fn screenshot(&self) -> String {
        self.screen.read().expect("screen lock poisoned").screen().contents()
    }

    /// Write to the running process.
    ///
    /// # Errors
    /// Returns an error if no process is running or the write fails.
    pub(crate) fn send_input(&self, data: &[u8]) -> Result<()> {
        self.process
            .as_ref()
            .ok_or(Error::PaneClosed)?
            .send_input(data)
    }

    /// Kill the running process, if any.
    pub(crate) fn kill(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
    }

    /// Lines scrolled back from the live view.
    #[must_use]
    pub fn scroll_offset(&self) -> usize {
        self.screen.read().expect("screen lock poisoned").screen().scrollback()
    }

    /// Enter scroll mode without moving the view.
    pub(crate) fn start_scroll(&mut self) {
        self.scrolling = true;
    }

    /// Scroll by `delta` lines (positive = back in history). Returns the new
    /// offset, which the emulator clamps to the available scrollback.
    pub(crate) fn scroll_by(&mut self, delta: isize) -> usize {
        self.scrolling = true;
        let mut screen = self.screen.write().expect("screen lock poisoned");
        let offset = screen.screen().scrollback().saturating_add_signed(delta);
        screen.set_scrollback(offset);
        screen.screen().scrollback()
    }

    /// Jump back to live output and leave scroll mode.
    pub(crate) fn reset_scroll(&mut self) {
        self.scrolling = false;
        self.screen.write().expect("screen lock poisoned").set_scrollback(0);
    }
}

impl std::fmt::Debug for PaneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneState")
            .field("index", &self.index)
            .field("area", &self.area)
            .field("status", &self.status)
            .field("generation", &self.generation)
            .field("error", &self.error)
            .field("scrolling", &self.scrolling)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane(area: Rect) -> PaneState {
        PaneState::new(1, PaneSpec::new("true"), area, 100, PatternList::default())
    }

    #[test]
    fn test_inner_size() {
        assert_eq!(PaneSize::inside(Rect::new(0, 0, 80, 24)), PaneSize::new(22, 78));
        assert_eq!(PaneSize::inside(Rect::new(0, 0, 3, 3)), PaneSize::new(1, 1));
    }

    #[test]
    fn test_set_area_resizes_screen() {
        let mut pane = pane(Rect::new(0, 0, 20, 10));
        pane.set_area(Rect::new(5, 0, 30, 12)).unwrap();
        assert_eq!(pane.area(), Rect::new(5, 0, 30, 12));
        assert_eq!(pane.screen.read().unwrap().screen().size(), (10, 28));
    }

    #[test]
    fn test_feed_and_screenshot() {
        let pane = pane(Rect::new(0, 0, 20, 6));
        pane.feed(b"\x1b[31mfirst\x1b[0m\r\nsecond");
        assert_eq!(pane.screenshot(), "first\nsecond");
    }

    #[test]
    fn test_scrolling() {
        let mut pane = pane(Rect::new(0, 0, 20, 5));
        for i in 0..10 {
            pane.feed(format!("line {i}\r\n").as_bytes());
        }
        assert_eq!(pane.scroll_by(2), 2);
        assert!(pane.is_scrolling());
        // Clamped to the available history.
        let offset = pane.scroll_by(1_000);
        assert!(offset >= 2 && offset <= 10);
        assert_eq!(pane.scroll_by(-1_000), 0);
        pane.reset_scroll();
        assert!(!pane.is_scrolling());
        assert_eq!(pane.scroll_offset(), 0);
    }

    #[test]
    fn test_send_input_without_process() {
        let pane = pane(Rect::new(0, 0, 20, 5));
        assert!(matches!(pane.send_input(b"x"), Err(Error::PaneClosed)));
    }
}
