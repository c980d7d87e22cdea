//! Session controller - owns the pane registry and drives every component.

use std::time::{Duration, Instant};

use crossterm::event::{KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::input::{Action, InputContext, InputDispatcher, Scroll};
use crate::layout::{LayoutCalculator, LayoutNode};
use crate::lifecycle::{self, ExitAction, Lifecycle, ProcessState, Terminations};
use crate::monitor::{ErrorMonitor, MonitorReport, PatternList};
use crate::navigate::{self, Direction};
use crate::notify::{Notifier, TerminalNotifier};
use crate::pane::{PaneSize, PaneState};
use crate::pty::{PaneEvent, PtySpawner, SpawnRequest, Spawner};

/// Everything the session loop reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A key press.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// The screen was resized to the given area.
    Resize(Rect),
    /// Error monitor interval elapsed.
    Tick,
    /// A pane process reported something.
    Pane(PaneEvent),
    /// A delayed restart is due.
    Restart { index: usize, generation: u64 },
    /// The shutdown grace period elapsed.
    Shutdown,
}

/// Whether the loop should keep going.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep processing events.
    Continue,
    /// Every pane is gone; leave the loop.
    Quit,
}

/// Process-wide session state.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Focused pane (0-based registry position).
    pub focused: usize,
    /// Zoomed pane (0-based registry position).
    pub zoomed: Option<usize>,
    /// Pane numbers shown in titles.
    pub numbering: bool,
    /// Final exits counted for the wait policy.
    pub terminations: Terminations,
    /// A shutdown timer is running.
    pub shutdown_pending: bool,
    /// The help overlay is shown.
    pub help_visible: bool,
    /// The screen must be cleared and fully redrawn.
    pub redraw_requested: bool,
    /// Something visible changed since the last draw.
    pub dirty: bool,
    /// The session has been torn down.
    pub quit: bool,
}

/// Top-level orchestrator for a split layout of pane processes.
pub struct Session {
    /// Configuration.
    config: SessionConfig,
    /// Layout the panes were provisioned from.
    layout: Option<LayoutNode>,
    /// Pane registry in display order.
    panes: Vec<PaneState>,
    /// Global state.
    state: SessionState,
    /// Full screen area.
    screen_area: Rect,
    /// Keyboard state machine.
    input: InputDispatcher,
    /// Error pattern scanner.
    monitor: ErrorMonitor,
    /// Restart and shutdown policy.
    lifecycle: Lifecycle,
    /// Starts pane processes.
    spawner: Box<dyn Spawner>,
    /// Bell and desktop notifications.
    notifier: Box<dyn Notifier>,
    /// Event sender handed to processes and timers.
    event_tx: mpsc::Sender<SessionEvent>,
    /// Event receiver for the loop.
    event_rx: mpsc::Receiver<SessionEvent>,
}

impl Session {
    /// Create a session using native PTYs and terminal notifications.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_backends(config, Box::new(PtySpawner), Box::new(TerminalNotifier))
    }

    /// Create a session with custom process and notification backends.
    #[must_use]
    pub fn with_backends(
        config: SessionConfig,
        spawner: Box<dyn Spawner>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let state = SessionState {
            numbering: config.numbering,
            ..SessionState::default()
        };
        Self {
            input: InputDispatcher::new(config.activator),
            monitor: ErrorMonitor::new(
                config.name.clone(),
                PatternList::default(),
                config.notify,
                config.notify_lock,
            ),
            lifecycle: Lifecycle::new(config.wait, config.shutdown_grace),
            config,
            layout: None,
            panes: Vec::new(),
            state,
            screen_area: Rect::default(),
            spawner,
            notifier,
            event_tx,
            event_rx,
        }
    }

    /// Build the pane registry from `layout` and spawn every command.
    ///
    /// Nothing is spawned if the layout is invalid or does not fit.
    ///
    /// # Errors
    /// Returns an error for invalid layouts, unparsable error patterns, or a
    /// screen too small for the layout.
    pub fn initial_provision(&mut self, layout: LayoutNode, area: Rect) -> Result<()> {
        if !self.panes.is_empty() {
            return Err(Error::AlreadyProvisioned);
        }
        layout.validate()?;
        let global = PatternList::parse(&self.config.error_patterns)?;
        let areas = LayoutCalculator::calculate_areas(&layout, area)?;
        let locals = layout
            .panes()
            .iter()
            .map(|spec| {
                spec.error_patterns
                    .as_deref()
                    .map_or_else(|| Ok(PatternList::default()), PatternList::parse)
            })
            .collect::<Result<Vec<_>>>()?;

        self.monitor = ErrorMonitor::new(
            self.config.name.clone(),
            global,
            self.config.notify,
            self.config.notify_lock,
        );
        self.screen_area = area;
        self.panes = layout
            .panes()
            .into_iter()
            .zip(areas)
            .zip(locals)
            .enumerate()
            .map(|(i, ((spec, area), local))| {
                PaneState::new(i + 1, spec.clone(), area, self.config.scrollback, local)
            })
            .collect();
        self.state.focused = layout.focus_request().unwrap_or(0);
        self.layout = Some(layout);

        tracing::info!("provisioned {} panes in {:?}", self.panes.len(), area);
        for pos in 0..self.panes.len() {
            self.spawn_pane(pos);
        }
        self.state.dirty = true;
        Ok(())
    }

    /// Re-run the layout for a new screen area, keeping every process.
    ///
    /// # Errors
    /// Returns an error if the new area is too small; the previous geometry
    /// is kept in that case.
    pub fn reprovision(&mut self, area: Rect) -> Result<()> {
        let Some(layout) = &self.layout else {
            return Ok(());
        };
        let areas = LayoutCalculator::calculate_areas(layout, area)?;
        self.screen_area = area;
        self.apply_areas(&areas);
        Ok(())
    }

    fn relayout(&mut self) {
        if let Err(e) = self.reprovision(self.screen_area) {
            tracing::warn!("re-layout failed: {}", e);
        }
    }

    fn apply_areas(&mut self, areas: &[Rect]) {
        for (pos, (pane, area)) in self.panes.iter_mut().zip(areas).enumerate() {
            let effective = if self.state.zoomed == Some(pos) {
                self.screen_area
            } else {
                *area
            };
            if let Err(e) = pane.set_area(effective) {
                tracing::warn!("failed to resize pane {}: {}", pane.index, e);
            }
        }
        self.state.dirty = true;
    }

    /// Number of panes whose commands terminate for good.
    fn expected_terminations(&self) -> usize {
        self.panes.iter().filter(|p| !p.spec.restart).count()
    }

    /// Start (or restart) the process of the pane at `pos`.
    fn spawn_pane(&mut self, pos: usize) {
        let pane = &mut self.panes[pos];
        pane.generation += 1;
        pane.status = ProcessState::Spawning;
        let request = SpawnRequest {
            index: pane.index,
            generation: pane.generation,
            command: pane.spec.command.clone(),
            size: PaneSize::inside(pane.area),
            screen: pane.screen.clone(),
            events: self.event_tx.clone(),
        };

        match self.spawner.spawn(request) {
            Ok(process) => {
                pane.process = Some(process);
                pane.status = ProcessState::Running;
            }
            Err(e) => {
                tracing::warn!("pane {} failed to start: {}", pane.index, e);
                let error = e.to_string();
                pane.feed(&lifecycle::failure_banner(&error));
                pane.status = ProcessState::Failed { error };
                // Restarting panes never count towards the shutdown threshold.
                if !pane.spec.restart {
                    pane.counted_exit = Some(true);
                    self.state.terminations.record(true);
                    self.check_shutdown();
                }
            }
        }
        self.state.dirty = true;
    }

    fn check_shutdown(&mut self) {
        if let Some(grace) = self
            .lifecycle
            .shutdown_due(&self.state.terminations, self.expected_terminations())
        {
            self.schedule_shutdown(grace);
        }
    }

    fn schedule_shutdown(&mut self, grace: Duration) {
        if !self.state.shutdown_pending {
            tracing::info!("all commands finished, quitting in {:?}", grace);
            self.state.shutdown_pending = true;
            self.schedule(grace, SessionEvent::Shutdown);
        }
    }

    /// Post `event` onto the queue after `delay`.
    fn schedule(&self, delay: Duration, event: SessionEvent) {
        let tx = self.event_tx.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(event).await;
                });
            }
            Err(_) => tracing::warn!("no runtime to schedule {:?}", event),
        }
    }

    fn on_pane_exit(&mut self, index: usize, generation: u64, code: i32) {
        let Some(pos) = index.checked_sub(1).filter(|&p| p < self.panes.len()) else {
            return;
        };
        let expected = self.expected_terminations();
        let pane = &mut self.panes[pos];
        if pane.generation != generation {
            tracing::debug!("ignoring stale exit of pane {} (generation {})", index, generation);
            return;
        }
        tracing::info!("pane {} exited with code {}", index, code);

        pane.process = None;
        pane.status = ProcessState::Exited { code };
        pane.feed(&lifecycle::exit_banner(code));

        let action = self.lifecycle.on_exit(
            &mut self.state.terminations,
            pane.spec.restart,
            pane.spec.restart_delay,
            code,
            expected,
        );
        match action {
            ExitAction::Respawn => {
                pane.status = ProcessState::Restarting;
                self.spawn_pane(pos);
            }
            ExitAction::RespawnAfter(delay) => {
                pane.status = ProcessState::Restarting;
                self.schedule(delay, SessionEvent::Restart { index, generation });
            }
            ExitAction::Terminated { shutdown } => {
                pane.status = ProcessState::Terminated { code };
                pane.counted_exit = Some(code != 0);
                if let Some(grace) = shutdown {
                    self.schedule_shutdown(grace);
                }
            }
        }
        self.state.dirty = true;
    }

    fn on_restart_due(&mut self, index: usize, generation: u64) {
        let Some(pos) = index.checked_sub(1).filter(|&p| p < self.panes.len()) else {
            return;
        };
        let pane = &self.panes[pos];
        if pane.generation == generation && pane.status == ProcessState::Restarting {
            self.spawn_pane(pos);
        }
    }

    /// Kill the focused-or-given pane's process and start it again.
    pub fn manual_restart(&mut self, pos: usize) {
        let Some(pane) = self.panes.get_mut(pos) else {
            return;
        };
        tracing::info!("restarting pane {}", pane.index);
        pane.kill();
        if let Some(failed) = pane.counted_exit.take() {
            self.state.terminations.withdraw(failed);
        }
        self.spawn_pane(pos);
    }

    /// Kill every pane process and mark the session as finished.
    pub fn terminate_all(&mut self) {
        for pane in &mut self.panes {
            pane.kill();
        }
        self.state.quit = true;
    }

    /// Process one event.
    pub fn handle_event(&mut self, event: SessionEvent) -> Flow {
        match event {
            SessionEvent::Key(key) => return self.dispatch_key(key),
            SessionEvent::Mouse(mouse) => self.handle_mouse(mouse),
            SessionEvent::Resize(area) => {
                if let Err(e) = self.reprovision(area) {
                    tracing::warn!("keeping previous layout: {}", e);
                }
                self.state.help_visible = false;
                self.state.redraw_requested = true;
            }
            SessionEvent::Tick => {
                self.tick(Instant::now());
            }
            SessionEvent::Pane(PaneEvent::Output { index }) => {
                if let Some(pane) = index.checked_sub(1).and_then(|p| self.panes.get_mut(p)) {
                    pane.pending_update = true;
                    self.state.dirty = true;
                }
            }
            SessionEvent::Pane(PaneEvent::Bell { .. }) => self.notifier.beep(),
            SessionEvent::Pane(PaneEvent::Exited {
                index,
                generation,
                code,
            }) => self.on_pane_exit(index, generation, code),
            SessionEvent::Pane(PaneEvent::Crashed {
                index,
                generation,
                error,
            }) => {
                tracing::warn!("lost track of pane {}: {}", index, error);
                self.on_pane_exit(index, generation, -1);
            }
            SessionEvent::Restart { index, generation } => self.on_restart_due(index, generation),
            SessionEvent::Shutdown => {
                self.state.shutdown_pending = false;
                if self
                    .lifecycle
                    .shutdown_due(&self.state.terminations, self.expected_terminations())
                    .is_some()
                {
                    self.terminate_all();
                }
            }
        }
        self.flow()
    }

    fn flow(&self) -> Flow {
        if self.state.quit {
            Flow::Quit
        } else {
            Flow::Continue
        }
    }

    /// Route a key through the input dispatcher.
    pub fn dispatch_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind != KeyEventKind::Press {
            return self.flow();
        }
        let ctx = InputContext {
            zoomed: self.state.zoomed.is_some(),
            scrolling: self.focused_pane().is_some_and(PaneState::is_scrolling),
        };
        let action = self.input.dispatch(key, ctx);
        self.apply(action);
        self.flow()
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Forward(bytes) => self.send_to_focused(&bytes),
            Action::Resume(bytes) => {
                self.hide_help();
                self.send_to_focused(&bytes);
            }
            Action::Cancel => self.hide_help(),
            Action::FocusPrev => self.focus_prev(),
            Action::FocusNext => self.focus_next(),
            Action::FocusDirection(direction) => {
                self.focus_direction(direction);
            }
            Action::FocusNumber(n) => self.focus_number(n),
            Action::ToggleNumbering => {
                self.state.numbering = !self.state.numbering;
                self.state.dirty = true;
            }
            Action::Redraw => {
                self.relayout();
                self.state.redraw_requested = true;
            }
            Action::ToggleZoom => self.toggle_zoom(),
            Action::EnterScroll => {
                if let Some(pane) = self.focused_pane_mut() {
                    pane.start_scroll();
                }
                self.state.dirty = true;
            }
            Action::Scroll(scroll) => self.scroll_focused(scroll),
            Action::ExitScroll => {
                if let Some(pane) = self.focused_pane_mut() {
                    pane.reset_scroll();
                }
                self.state.dirty = true;
            }
            Action::Restart => self.manual_restart(self.state.focused),
            Action::ShowHelp => {
                self.state.help_visible = true;
                self.state.dirty = true;
            }
            Action::Terminate => self.terminate_all(),
        }
    }

    fn hide_help(&mut self) {
        if self.state.help_visible {
            self.state.help_visible = false;
            self.state.dirty = true;
        }
    }

    fn send_to_focused(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(pane) = self.focused_pane() {
            if let Err(e) = pane.send_input(bytes) {
                tracing::debug!("input to pane {} dropped: {}", pane.index, e);
            }
        }
    }

    fn scroll_focused(&mut self, scroll: Scroll) {
        let Some(pane) = self.focused_pane_mut() else {
            return;
        };
        let page = isize::try_from(PaneSize::inside(pane.area).rows).unwrap_or(1);
        match scroll {
            Scroll::Lines(n) => {
                pane.scroll_by(n);
            }
            Scroll::Pages(n) => {
                pane.scroll_by(n.saturating_mul(page));
            }
            Scroll::Top => {
                pane.scroll_by(isize::MAX);
            }
            Scroll::Bottom => pane.reset_scroll(),
        }
        self.state.dirty = true;
    }

    /// Move focus to the pane at `pos`, leaving scroll mode on both ends.
    fn move_focus(&mut self, pos: usize) {
        if let Some(pane) = self.focused_pane_mut() {
            pane.reset_scroll();
        }
        self.state.focused = pos;
        if let Some(pane) = self.focused_pane_mut() {
            pane.reset_scroll();
        }
        self.state.dirty = true;
    }

    /// Focus the previous pane in sequence, wrapping around.
    pub fn focus_prev(&mut self) {
        if self.state.zoomed.is_some() || self.panes.is_empty() {
            return;
        }
        let pos = self
            .state
            .focused
            .checked_sub(1)
            .unwrap_or(self.panes.len() - 1);
        self.move_focus(pos);
    }

    /// Focus the next pane in sequence, wrapping around.
    pub fn focus_next(&mut self) {
        if self.state.zoomed.is_some() || self.panes.is_empty() {
            return;
        }
        let pos = (self.state.focused + 1) % self.panes.len();
        self.move_focus(pos);
    }

    /// Focus the best neighbour in `direction`. Returns whether focus moved.
    pub fn focus_direction(&mut self, direction: Direction) -> bool {
        if self.state.zoomed.is_some() {
            return false;
        }
        let areas: Vec<Rect> = self.panes.iter().map(PaneState::area).collect();
        match navigate::navigate(&areas, self.state.focused, direction) {
            Some(pos) => {
                self.move_focus(pos);
                true
            }
            None => false,
        }
    }

    /// Focus the pane with the given 1-based number, if it exists.
    pub fn focus_number(&mut self, number: usize) {
        if self.state.zoomed.is_some() || number == 0 || number > self.panes.len() {
            return;
        }
        self.state.focused = number - 1;
        self.state.dirty = true;
    }

    /// Zoom the focused pane to full screen, or undo the zoom.
    pub fn toggle_zoom(&mut self) {
        if self.panes.is_empty() {
            return;
        }
        self.state.zoomed = match self.state.zoomed {
            Some(_) => None,
            None => Some(self.state.focused),
        };
        self.relayout();
    }

    /// Handle mouse wheel and click events.
    pub fn handle_mouse(&mut self, event: MouseEvent) {
        if !self.config.mouse {
            return;
        }
        let Some(pos) = self.pane_at(event.column, event.row) else {
            return;
        };
        match event.kind {
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let pane = &mut self.panes[pos];
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let step = ((f32::from(pane.area.height) * 0.10).floor() as usize).max(1);
                let step = isize::try_from(step).unwrap_or(1);
                let delta = if event.kind == MouseEventKind::ScrollUp {
                    step
                } else {
                    -step
                };
                if pane.scroll_by(delta) == 0 {
                    pane.reset_scroll();
                }
                self.state.dirty = true;
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if self.state.zoomed.is_none() && pos != self.state.focused {
                    self.move_focus(pos);
                }
            }
            _ => {}
        }
    }

    /// Pane under the given screen cell; the zoomed pane covers everything.
    #[must_use]
    pub fn pane_at(&self, x: u16, y: u16) -> Option<usize> {
        let position = Position::new(x, y);
        if let Some(zoomed) = self.state.zoomed {
            return self
                .panes
                .get(zoomed)
                .filter(|p| p.area.contains(position))
                .map(|_| zoomed);
        }
        self.panes.iter().position(|p| p.area.contains(position))
    }

    /// Run one error scan and deliver any due notification.
    pub fn tick(&mut self, now: Instant) -> MonitorReport {
        let report = self.monitor.tick(&mut self.panes, now);
        if report.dirty {
            self.state.dirty = true;
        }
        if let Some(notification) = &report.notification {
            notification.deliver(self.notifier.as_ref());
        }
        report
    }

    /// Drain queued events without blocking.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next queued event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Sender for posting events from other sources.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.event_tx.clone()
    }

    /// 1-based number of the focused pane.
    #[must_use]
    pub fn focused_pane_index(&self) -> usize {
        self.state.focused + 1
    }

    fn focused_pane(&self) -> Option<&PaneState> {
        self.panes.get(self.state.focused)
    }

    fn focused_pane_mut(&mut self) -> Option<&mut PaneState> {
        self.panes.get_mut(self.state.focused)
    }

    /// The pane registry in display order.
    #[must_use]
    pub fn panes(&self) -> &[PaneState] {
        &self.panes
    }

    /// Global session state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Full screen area.
    #[must_use]
    pub fn screen_area(&self) -> Rect {
        self.screen_area
    }

    /// Whether keys are passed through to the focused pane.
    #[must_use]
    pub fn forwarding_input(&self) -> bool {
        self.input.forwarding()
    }

    /// Returns and clears the "needs drawing" flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.state.dirty)
    }

    /// Returns and clears the "clear screen before drawing" flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.state.redraw_requested)
    }

    /// Interval at which [`SessionEvent::Tick`] should be posted.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("panes", &self.panes)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
