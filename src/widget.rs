//! Ratatui widgets for rendering panes.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

use crate::pane::PaneState;
use crate::session::Session;

/// Title shown in a pane's top border.
#[must_use]
pub fn pane_title(pane: &PaneState, numbering: bool, zoomed: bool) -> String {
    let mut title = String::new();
    if numbering {
        title.push_str(&format!("[{}]-", pane.index()));
    }
    title.push_str(&format!("( {} )", pane.spec().label()));
    if zoomed {
        title.push_str("-[ZOOMED]");
    }
    if pane.is_error() {
        title.push_str("-[ERROR]");
    }
    title
}

/// Widget for rendering a single pane's terminal content.
pub struct PaneWidget<'a> {
    /// The pane to render.
    pane: &'a PaneState,
    /// Whether this pane is focused.
    focused: bool,
    /// Show the pane number in the title.
    numbering: bool,
    /// The pane is zoomed.
    zoomed: bool,
    /// Border colour of the focused pane.
    focus_style: Style,
    /// Border colour of panes in error.
    error_style: Style,
    /// Border colour of panes showing scrollback.
    scroll_style: Style,
}

impl<'a> PaneWidget<'a> {
    /// Create a new pane widget.
    #[must_use]
    pub fn new(pane: &'a PaneState) -> Self {
        Self {
            pane,
            focused: false,
            numbering: false,
            zoomed: false,
            focus_style: Style::default().fg(Color::Green),
            error_style: Style::default().fg(Color::Red),
            scroll_style: Style::default().fg(Color::Yellow),
        }
    }

    /// Set whether this pane is focused.
    #[must_use]
    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Show the pane number in the title.
    #[must_use]
    pub fn numbering(mut self, numbering: bool) -> Self {
        self.numbering = numbering;
        self
    }

    /// Mark the pane as zoomed.
    #[must_use]
    pub fn zoomed(mut self, zoomed: bool) -> Self {
        self.zoomed = zoomed;
        self
    }

    /// Set the focus style.
    #[must_use]
    pub fn focus_style(mut self, style: Style) -> Self {
        self.focus_style = style;
        self
    }

    fn border_style(&self) -> Style {
        if self.pane.is_scrolling() {
            self.scroll_style
        } else if self.pane.is_error() {
            self.error_style
        } else if self.focused {
            self.focus_style
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn block(&self) -> Block<'a> {
        let style = self.border_style();
        let title_style = if self.focused {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        };
        let title = pane_title(self.pane, self.numbering, self.zoomed);

        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(Span::styled(title, title_style))
    }
}

impl Widget for PaneWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let parser = self.pane.screen().read().expect("screen lock poisoned");
        let vt_screen = parser.screen();

        let block = self.block();
        let inner_area = block.inner(area);
        Clear.render(area, buf);
        block.render(area, buf);

        for row in 0..inner_area.height {
            for col in 0..inner_area.width {
                let x = inner_area.x + col;
                let y = inner_area.y + row;

                if x >= buf.area.x + buf.area.width || y >= buf.area.y + buf.area.height {
                    continue;
                }

                if let Some(cell) = vt_screen.cell(row, col) {
                    let buf_cell = &mut buf[(x, y)];

                    let ch = cell.contents().chars().next().unwrap_or(' ');
                    buf_cell.set_char(ch);

                    let mut fg = convert_color(cell.fgcolor());
                    let mut bg = convert_color(cell.bgcolor());
                    if cell.inverse() {
                        std::mem::swap(&mut fg, &mut bg);
                    }

                    let mut style = Style::default().fg(fg).bg(bg);
                    if cell.bold() {
                        style = style.add_modifier(Modifier::BOLD);
                    }
                    if cell.italic() {
                        style = style.add_modifier(Modifier::ITALIC);
                    }
                    if cell.underline() {
                        style = style.add_modifier(Modifier::UNDERLINED);
                    }
                    buf_cell.set_style(style);
                }
            }
        }

        // The cursor position is meaningless while showing scrollback.
        if self.focused && !self.pane.is_scrolling() && !vt_screen.hide_cursor() {
            let (cursor_row, cursor_col) = vt_screen.cursor_position();
            let cursor_x = inner_area.x + cursor_col;
            let cursor_y = inner_area.y + cursor_row;

            if cursor_x < inner_area.x + inner_area.width
                && cursor_y < inner_area.y + inner_area.height
                && cursor_x < buf.area.x + buf.area.width
                && cursor_y < buf.area.y + buf.area.height
            {
                let cell = &mut buf[(cursor_x, cursor_y)];
                cell.set_style(Style::default().add_modifier(Modifier::REVERSED));
            }
        }
    }
}

/// Widget for rendering every pane of a session.
pub struct SessionWidget<'a> {
    /// The session to draw.
    session: &'a Session,
}

impl<'a> SessionWidget<'a> {
    /// Create a new session widget.
    #[must_use]
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }
}

impl Widget for SessionWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.session.state();
        let panes = self.session.panes();

        let draw = |pos: usize, buf: &mut Buffer| {
            let pane = &panes[pos];
            PaneWidget::new(pane)
                .focused(pos == state.focused)
                .numbering(state.numbering)
                .zoomed(state.zoomed == Some(pos))
                .render(pane.area().intersection(area), buf);
        };

        // The zoomed pane goes last so it covers the others.
        for pos in (0..panes.len()).filter(|&p| state.zoomed != Some(p)) {
            draw(pos, buf);
        }
        if let Some(pos) = state.zoomed.filter(|&p| p < panes.len()) {
            draw(pos, buf);
        }

        if state.help_visible {
            let overlay = HelpOverlay::new(self.session.config().activator);
            overlay.render(HelpOverlay::calculate_area(area), buf);
        }
    }
}

/// Prefix-mode key bindings shown by the help overlay.
const BINDINGS: [(&str, &str); 12] = [
    ("Space / Bksp", "next / previous pane"),
    ("Arrows", "move focus"),
    ("1-9", "focus pane by number"),
    ("n", "toggle pane numbers"),
    ("z", "zoom focused pane"),
    ("v", "scroll mode (arrows, PgUp/PgDn)"),
    ("r", "restart command"),
    ("l", "redraw"),
    ("k", "kill everything and quit"),
    ("?", "this help"),
    ("", ""),
    ("any key", "close"),
];

/// Overlay listing the prefix-mode key bindings.
pub struct HelpOverlay {
    /// The activator character.
    activator: char,
    /// Style for the overlay border.
    border_style: Style,
    /// Style for key names.
    key_style: Style,
}

impl HelpOverlay {
    /// Create a help overlay for `Ctrl+<activator>`.
    #[must_use]
    pub fn new(activator: char) -> Self {
        Self {
            activator,
            border_style: Style::default().fg(Color::Yellow),
            key_style: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        }
    }

    /// Set the border style.
    #[must_use]
    pub fn border_style(mut self, style: Style) -> Self {
        self.border_style = style;
        self
    }

    /// Calculate the overlay area for a given terminal size.
    #[must_use]
    pub fn calculate_area(terminal_area: Rect) -> Rect {
        #[allow(clippy::cast_possible_truncation)]
        let rows = BINDINGS.len() as u16 + 4;
        let width = 52.min(terminal_area.width.saturating_sub(4));
        let height = rows.min(terminal_area.height.saturating_sub(2));
        let x = terminal_area.x + (terminal_area.width.saturating_sub(width)) / 2;
        let y = terminal_area.y + (terminal_area.height.saturating_sub(height)) / 2;
        Rect::new(x, y, width, height)
    }
}

impl Widget for HelpOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let title = format!(" Ctrl+{} then... ", self.activator.to_ascii_uppercase());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.border_style)
            .title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        let lines: Vec<Line> = BINDINGS
            .iter()
            .map(|(key, text)| {
                Line::from(vec![
                    Span::styled(format!(" {key:<13}"), self.key_style),
                    Span::raw(*text),
                ])
            })
            .collect();
        Paragraph::new(lines).render(
            Rect::new(inner.x, inner.y + 1, inner.width, inner.height.saturating_sub(1)),
            buf,
        );

        let hint = Paragraph::new(format!(
            "Ctrl+{a} {a} sends a literal Ctrl+{a}",
            a = self.activator
        ))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
        let hint_area = Rect::new(
            inner.x,
            inner.y + inner.height.saturating_sub(1),
            inner.width,
            1,
        );
        hint.render(hint_area, buf);
    }
}

/// Convert a vt100 color to a ratatui color.
fn convert_color(color: vt100::Color) -> Color {
    match color {
        vt100::Color::Default => Color::Reset,
        vt100::Color::Idx(idx) => Color::Indexed(idx),
        vt100::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::*;
    use crate::config::SessionConfig;
    use crate::layout::{LayoutNode, PaneSpec};
    use crate::monitor::PatternList;
    use crate::session::tests::session;

    fn row_text(buf: &Buffer, y: u16) -> String {
        (buf.area.x..buf.area.x + buf.area.width)
            .map(|x| buf[(x, y)].symbol())
            .collect()
    }

    fn screen_text(buf: &Buffer) -> String {
        (buf.area.y..buf.area.y + buf.area.height)
            .map(|y| row_text(buf, y))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn pane(title: Option<&str>) -> PaneState {
        let mut spec = PaneSpec::new("cargo watch");
        if let Some(title) = title {
            spec = spec.title(title);
        }
        PaneState::new(3, spec, Rect::new(0, 0, 40, 6), 100, PatternList::default())
    }

    #[test]
    fn test_title_variants() {
        let mut pane = pane(None);
        assert_eq!(pane_title(&pane, false, false), "( cargo watch )");
        pane.error = true;
        assert_eq!(
            pane_title(&pane, true, true),
            "[3]-( cargo watch )-[ZOOMED]-[ERROR]"
        );
        assert_eq!(pane_title(&self::pane(Some("build")), false, false), "( build )");
    }

    #[test]
    fn test_pane_widget_draws_content_and_title() {
        let pane = pane(Some("build"));
        pane.feed(b"hello");
        let area = Rect::new(0, 0, 40, 6);
        let mut buf = Buffer::empty(area);
        PaneWidget::new(&pane).focused(true).render(area, &mut buf);

        assert!(row_text(&buf, 0).contains("( build )"));
        assert!(row_text(&buf, 1).starts_with("│hello"));
        assert_eq!(buf[(0, 0)].fg, Color::Green);
    }

    #[test]
    fn test_border_colour_precedence() {
        let area = Rect::new(0, 0, 40, 6);
        let mut pane = pane(None);
        pane.error = true;

        let mut buf = Buffer::empty(area);
        PaneWidget::new(&pane).focused(true).render(area, &mut buf);
        assert_eq!(buf[(0, 0)].fg, Color::Red);

        pane.start_scroll();
        let mut buf = Buffer::empty(area);
        PaneWidget::new(&pane).focused(true).render(area, &mut buf);
        assert_eq!(buf[(0, 0)].fg, Color::Yellow);
    }

    #[test]
    fn test_session_widget_draws_zoomed_pane_on_top() {
        let (mut session, _, _) = session(SessionConfig::default());
        let layout = LayoutNode::horizontal(vec![
            LayoutNode::pane(PaneSpec::new("left")),
            LayoutNode::pane(PaneSpec::new("right").focus()),
        ]);
        let area = Rect::new(0, 0, 40, 10);
        session.initial_provision(layout, area).unwrap();

        let mut buf = Buffer::empty(area);
        SessionWidget::new(&session).render(area, &mut buf);
        let top = row_text(&buf, 0);
        assert!(top.contains("( left )") && top.contains("( right )"));

        session.toggle_zoom();
        let mut buf = Buffer::empty(area);
        SessionWidget::new(&session).render(area, &mut buf);
        let top = row_text(&buf, 0);
        assert!(top.contains("( right )-[ZOOMED]"));
        assert!(!top.contains("( left )"));
    }

    #[test]
    fn test_help_overlay_shown() {
        let (mut session, _, _) = session(SessionConfig::default());
        let area = Rect::new(0, 0, 80, 24);
        session
            .initial_provision(LayoutNode::pane(PaneSpec::new("sh")), area)
            .unwrap();
        session.dispatch_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL));
        session.dispatch_key(KeyEvent::new(KeyCode::Char('?'), KeyModifiers::NONE));

        let mut buf = Buffer::empty(area);
        SessionWidget::new(&session).render(area, &mut buf);
        let text = screen_text(&buf);
        assert!(text.contains("Ctrl+A then..."));
        assert!(text.contains("zoom focused pane"));
    }
}
