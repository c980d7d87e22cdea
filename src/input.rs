//! Keyboard input routing: prefix-mode commands vs. pass-through.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::navigate::Direction;

/// Input dispatcher state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    /// Keys go to the focused pane.
    #[default]
    Idle,
    /// The activator chord was pressed; the next key is a command.
    Prefix,
    /// A command just ran; the next key restores normal routing.
    LeavingPrefix,
}

/// How a scroll-mode key moves the view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scroll {
    /// Lines back (positive) or forward (negative).
    Lines(isize),
    /// Pages back (positive) or forward (negative).
    Pages(isize),
    /// Oldest line of the scrollback.
    Top,
    /// Back to live output, leaving scroll mode.
    Bottom,
}

/// What the session should do with a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Nothing.
    None,
    /// Write bytes to the focused pane.
    Forward(Vec<u8>),
    /// Hide the help overlay, then write the bytes (if any) to the focused pane.
    Resume(Vec<u8>),
    /// Leave prefix mode without doing anything.
    Cancel,
    /// Focus the previous pane in sequence.
    FocusPrev,
    /// Focus the next pane in sequence.
    FocusNext,
    /// Focus the best neighbour in a direction.
    FocusDirection(Direction),
    /// Focus the pane with this 1-based number.
    FocusNumber(usize),
    /// Toggle pane numbers in titles.
    ToggleNumbering,
    /// Force a full redraw.
    Redraw,
    /// Toggle zoom of the focused pane.
    ToggleZoom,
    /// Enter scroll mode on the focused pane.
    EnterScroll,
    /// Scroll the focused pane.
    Scroll(Scroll),
    /// Leave scroll mode on the focused pane.
    ExitScroll,
    /// Restart the focused pane's command.
    Restart,
    /// Show the help overlay.
    ShowHelp,
    /// Kill every pane and quit.
    Terminate,
}

/// Facts about the session the dispatcher needs.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputContext {
    /// A pane is zoomed.
    pub zoomed: bool,
    /// The focused pane is in scroll mode.
    pub scrolling: bool,
}

/// Two-state (plus one transient) prefix-key machine.
#[derive(Clone, Debug)]
pub struct InputDispatcher {
    activator: char,
    mode: InputMode,
}

impl InputDispatcher {
    /// Create a dispatcher using `Ctrl+<activator>` as the prefix chord.
    #[must_use]
    pub fn new(activator: char) -> Self {
        Self {
            activator: activator.to_ascii_lowercase(),
            mode: InputMode::Idle,
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Whether keys are currently passed through to the focused pane.
    #[must_use]
    pub fn forwarding(&self) -> bool {
        self.mode == InputMode::Idle
    }

    fn is_activator_chord(&self, key: KeyEvent) -> bool {
        key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char(c) if c.to_ascii_lowercase() == self.activator)
    }

    /// Interpret one key press.
    pub fn dispatch(&mut self, key: KeyEvent, ctx: InputContext) -> Action {
        if self.is_activator_chord(key) && self.mode != InputMode::Prefix {
            self.mode = InputMode::Prefix;
            return Action::None;
        }

        match self.mode {
            InputMode::Idle if ctx.scrolling => scroll_key(key),
            InputMode::Idle => Action::Forward(key_to_bytes(key)),
            InputMode::LeavingPrefix => {
                self.mode = InputMode::Idle;
                let bytes = if ctx.scrolling {
                    Vec::new()
                } else {
                    key_to_bytes(key)
                };
                Action::Resume(bytes)
            }
            InputMode::Prefix => {
                let action = self.command(key, ctx);
                self.mode = if action == Action::Cancel {
                    InputMode::Idle
                } else {
                    InputMode::LeavingPrefix
                };
                action
            }
        }
    }

    fn command(&self, key: KeyEvent, ctx: InputContext) -> Action {
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
        let navigation = !ctx.zoomed;

        match key.code {
            KeyCode::Char(c) if plain && c == self.activator => {
                Action::Forward(vec![control_byte(self.activator)])
            }
            KeyCode::Backspace if navigation => Action::FocusPrev,
            KeyCode::Char(' ') if navigation => Action::FocusNext,
            KeyCode::Left if navigation => Action::FocusDirection(Direction::Left),
            KeyCode::Right if navigation => Action::FocusDirection(Direction::Right),
            KeyCode::Up if navigation => Action::FocusDirection(Direction::Up),
            KeyCode::Down if navigation => Action::FocusDirection(Direction::Down),
            KeyCode::Char(c @ '1'..='9') if navigation => {
                Action::FocusNumber(c as usize - '0' as usize)
            }
            // Navigation keys while zoomed do nothing but still end the prefix.
            KeyCode::Backspace
            | KeyCode::Char(' ' | '1'..='9')
            | KeyCode::Left
            | KeyCode::Right
            | KeyCode::Up
            | KeyCode::Down => Action::None,
            KeyCode::Char('n') if plain => Action::ToggleNumbering,
            KeyCode::Char('l') if plain => Action::Redraw,
            KeyCode::Char('z') if plain => Action::ToggleZoom,
            KeyCode::Char('v') if plain => Action::EnterScroll,
            KeyCode::Char('r') if plain => Action::Restart,
            KeyCode::Char('?') => Action::ShowHelp,
            KeyCode::Char('k') if plain => Action::Terminate,
            _ => Action::Cancel,
        }
    }
}

fn scroll_key(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Up => Action::Scroll(Scroll::Lines(1)),
        KeyCode::Down => Action::Scroll(Scroll::Lines(-1)),
        KeyCode::PageUp => Action::Scroll(Scroll::Pages(1)),
        KeyCode::PageDown => Action::Scroll(Scroll::Pages(-1)),
        KeyCode::Home => Action::Scroll(Scroll::Top),
        KeyCode::End => Action::Scroll(Scroll::Bottom),
        _ => Action::ExitScroll,
    }
}

/// Control byte for a letter (`'a'` → 0x01).
#[must_use]
pub fn control_byte(c: char) -> u8 {
    let code = c.to_ascii_lowercase() as u8;
    code.wrapping_sub(b'a').wrapping_add(1)
}

/// Convert a key event to bytes to send to the PTY.
#[must_use]
pub fn key_to_bytes(key: KeyEvent) -> Vec<u8> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Char(c) => {
            if ctrl {
                // Control characters (Ctrl+A = 0x01, etc.)
                if c.is_ascii_alphabetic() {
                    vec![control_byte(c)]
                } else {
                    vec![]
                }
            } else if alt {
                // Alt sends ESC prefix
                let mut bytes = vec![0x1b];
                bytes.extend(c.to_string().into_bytes());
                bytes
            } else {
                c.to_string().into_bytes()
            }
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::F(n) => match n {
            1 => b"\x1bOP".to_vec(),
            2 => b"\x1bOQ".to_vec(),
            3 => b"\x1bOR".to_vec(),
            4 => b"\x1bOS".to_vec(),
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => vec![],
        },
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    const IDLE: InputContext = InputContext {
        zoomed: false,
        scrolling: false,
    };

    #[test]
    fn test_idle_forwards() {
        let mut input = InputDispatcher::new('a');
        assert_eq!(
            input.dispatch(key(KeyCode::Char('x')), IDLE),
            Action::Forward(b"x".to_vec())
        );
        assert_eq!(input.mode(), InputMode::Idle);
    }

    #[test]
    fn test_prefix_then_command_then_resume() {
        let mut input = InputDispatcher::new('a');
        assert_eq!(input.dispatch(ctrl('a'), IDLE), Action::None);
        assert_eq!(input.mode(), InputMode::Prefix);
        assert!(!input.forwarding());

        assert_eq!(input.dispatch(key(KeyCode::Char('z')), IDLE), Action::ToggleZoom);
        assert_eq!(input.mode(), InputMode::LeavingPrefix);

        assert_eq!(
            input.dispatch(key(KeyCode::Char('l')), IDLE),
            Action::Resume(b"l".to_vec())
        );
        assert_eq!(input.mode(), InputMode::Idle);
    }

    #[test]
    fn test_activator_twice_injects_control_byte() {
        let mut input = InputDispatcher::new('b');
        input.dispatch(ctrl('b'), IDLE);
        assert_eq!(
            input.dispatch(key(KeyCode::Char('b')), IDLE),
            Action::Forward(vec![0x02])
        );
    }

    #[test]
    fn test_chord_from_leaving_prefix_reenters() {
        let mut input = InputDispatcher::new('a');
        input.dispatch(ctrl('a'), IDLE);
        input.dispatch(key(KeyCode::Char('n')), IDLE);
        assert_eq!(input.dispatch(ctrl('a'), IDLE), Action::None);
        assert_eq!(input.mode(), InputMode::Prefix);
        assert_eq!(input.dispatch(key(KeyCode::Char(' ')), IDLE), Action::FocusNext);
    }

    #[test]
    fn test_unknown_key_cancels_prefix() {
        let mut input = InputDispatcher::new('a');
        input.dispatch(ctrl('a'), IDLE);
        assert_eq!(input.dispatch(key(KeyCode::Char('x')), IDLE), Action::Cancel);
        assert_eq!(input.mode(), InputMode::Idle);
    }

    #[test]
    fn test_navigation_keys() {
        let cases = [
            (key(KeyCode::Backspace), Action::FocusPrev),
            (key(KeyCode::Char(' ')), Action::FocusNext),
            (key(KeyCode::Left), Action::FocusDirection(Direction::Left)),
            (key(KeyCode::Down), Action::FocusDirection(Direction::Down)),
            (key(KeyCode::Char('3')), Action::FocusNumber(3)),
            (key(KeyCode::Char('?')), Action::ShowHelp),
            (key(KeyCode::Char('r')), Action::Restart),
            (key(KeyCode::Char('v')), Action::EnterScroll),
            (key(KeyCode::Char('k')), Action::Terminate),
        ];
        for (k, expected) in cases {
            let mut input = InputDispatcher::new('a');
            input.dispatch(ctrl('a'), IDLE);
            assert_eq!(input.dispatch(k, IDLE), expected);
        }
    }

    #[test]
    fn test_navigation_disabled_while_zoomed() {
        let zoomed = InputContext {
            zoomed: true,
            scrolling: false,
        };
        let mut input = InputDispatcher::new('a');
        input.dispatch(ctrl('a'), zoomed);
        assert_eq!(input.dispatch(key(KeyCode::Right), zoomed), Action::None);
        assert_eq!(input.mode(), InputMode::LeavingPrefix);

        input.dispatch(ctrl('a'), zoomed);
        assert_eq!(input.dispatch(key(KeyCode::Char('z')), zoomed), Action::ToggleZoom);
    }

    #[test]
    fn test_scroll_mode_keys() {
        let scrolling = InputContext {
            zoomed: false,
            scrolling: true,
        };
        let mut input = InputDispatcher::new('a');
        assert_eq!(
            input.dispatch(key(KeyCode::Up), scrolling),
            Action::Scroll(Scroll::Lines(1))
        );
        assert_eq!(
            input.dispatch(key(KeyCode::PageDown), scrolling),
            Action::Scroll(Scroll::Pages(-1))
        );
        assert_eq!(input.dispatch(key(KeyCode::Char('q')), scrolling), Action::ExitScroll);
        // The prefix still works while scrolling.
        assert_eq!(input.dispatch(ctrl('a'), scrolling), Action::None);
        assert_eq!(input.mode(), InputMode::Prefix);
    }

    #[test]
    fn test_key_to_bytes() {
        assert_eq!(key_to_bytes(ctrl('c')), vec![0x03]);
        assert_eq!(key_to_bytes(key(KeyCode::Enter)), vec![b'\r']);
        assert_eq!(
            key_to_bytes(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT)),
            vec![0x1b, b'x']
        );
        assert_eq!(key_to_bytes(key(KeyCode::Char('é'))), "é".as_bytes().to_vec());
        assert_eq!(key_to_bytes(key(KeyCode::F(5))), b"\x1b[15~".to_vec());
    }
}
