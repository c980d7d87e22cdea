//! Session configuration.

use std::time::Duration;

use crate::lifecycle::WaitPolicy;
use crate::notify::NotificationMethods;

/// Default global error patterns.
pub const DEFAULT_ERROR_PATTERNS: &str = "(?:ERROR|Error|error)";

/// Policy knobs for a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Application name used in notifications.
    pub name: String,
    /// `Ctrl+<activator>` enters prefix mode.
    pub activator: char,
    /// Error patterns applied to every pane.
    pub error_patterns: String,
    /// How to notify about detected errors.
    pub notify: NotificationMethods,
    /// When to quit after all commands finished.
    pub wait: WaitPolicy,
    /// Show pane numbers in titles from the start.
    pub numbering: bool,
    /// Handle mouse wheel and clicks.
    pub mouse: bool,
    /// Scrollback lines kept per pane.
    pub scrollback: usize,
    /// Interval between error scans.
    pub tick_interval: Duration,
    /// Quiet period after a notification.
    pub notify_lock: Duration,
    /// Delay before quitting once every command finished.
    pub shutdown_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "splitmux".to_string(),
            activator: 'a',
            error_patterns: DEFAULT_ERROR_PATTERNS.to_string(),
            notify: NotificationMethods::default(),
            wait: WaitPolicy::default(),
            numbering: false,
            mouse: false,
            scrollback: 1000,
            tick_interval: Duration::from_millis(500),
            notify_lock: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// Set the activator character.
    #[must_use]
    pub fn activator(mut self, activator: char) -> Self {
        self.activator = activator;
        self
    }

    /// Set the global error patterns (empty disables global scanning).
    #[must_use]
    pub fn error_patterns(mut self, patterns: impl Into<String>) -> Self {
        self.error_patterns = patterns.into();
        self
    }

    /// Set the notification methods.
    #[must_use]
    pub fn notify(mut self, methods: NotificationMethods) -> Self {
        self.notify = methods;
        self
    }

    /// Set the wait policy.
    #[must_use]
    pub fn wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Show pane numbers from the start.
    #[must_use]
    pub fn numbering(mut self, numbering: bool) -> Self {
        self.numbering = numbering;
        self
    }

    /// Enable mouse handling.
    #[must_use]
    pub fn mouse(mut self, mouse: bool) -> Self {
        self.mouse = mouse;
        self
    }
}
