//! Notification delivery: terminal bell and desktop notifications.

use std::io::Write;
use std::str::FromStr;

/// Set of notification methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotificationMethods {
    /// Ring the terminal bell.
    pub beep: bool,
    /// Show a desktop notification.
    pub system: bool,
}

impl NotificationMethods {
    /// Whether no method is enabled.
    #[must_use]
    pub fn is_empty(self) -> bool {
        !self.beep && !self.system
    }
}

impl FromStr for NotificationMethods {
    type Err = String;

    /// Parse a comma separated list such as `"beep,system"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut methods = Self::default();
        for method in s.split(',').map(str::trim).filter(|m| !m.is_empty()) {
            match method {
                "beep" => methods.beep = true,
                "system" => methods.system = true,
                other => return Err(format!("unknown notification method {other:?}")),
            }
        }
        Ok(methods)
    }
}

/// A notification about panes in error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Summary line.
    pub title: String,
    /// Body text.
    pub message: String,
    /// How to deliver it.
    pub methods: NotificationMethods,
}

impl Notification {
    /// Build the notification for the given erroring panes (1-based).
    #[must_use]
    pub fn for_errors(name: &str, panes: &[usize], methods: NotificationMethods) -> Self {
        let plural = if panes.len() > 1 { "s" } else { "" };
        let list = panes
            .iter()
            .map(|i| format!("#{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            title: format!("{name}: Detected new ERROR situation{plural}"),
            message: format!("{name}: ERROR situation{plural} detected in terminal{plural} {list}"),
            methods,
        }
    }

    /// Send through every configured method.
    pub fn deliver(&self, notifier: &dyn Notifier) {
        tracing::info!("{}", self.message);
        if self.methods.beep {
            notifier.beep();
        }
        if self.methods.system {
            notifier.desktop(&self.title, &self.message);
        }
    }
}

/// Output side of notifications.
pub trait Notifier: Send {
    /// Ring the host terminal's bell.
    fn beep(&self);

    /// Show a desktop notification.
    fn desktop(&self, title: &str, message: &str);
}

/// Rings the bell on stdout and shows notifications through the desktop's
/// notification service.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn beep(&self) {
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(b"\x07").and_then(|()| stdout.flush()) {
            tracing::warn!("failed to ring bell: {}", e);
        }
    }

    fn desktop(&self, title: &str, message: &str) {
        if let Err(e) = notify_rust::Notification::new()
            .summary(title)
            .body(message)
            .timeout(notify_rust::Timeout::Milliseconds(5000))
            .show()
        {
            tracing::warn!("failed to send desktop notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Default)]
    struct Counting {
        beeps: Arc<AtomicUsize>,
        desktops: Arc<AtomicUsize>,
    }

    impl Notifier for Counting {
        fn beep(&self) {
            self.beeps.fetch_add(1, Ordering::SeqCst);
        }

        fn desktop(&self, _title: &str, _message: &str) {
            self.desktops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_parse_methods() {
        let methods: NotificationMethods = "beep, system".parse().unwrap();
        assert!(methods.beep && methods.system);
        assert!("".parse::<NotificationMethods>().unwrap().is_empty());
        assert!("email".parse::<NotificationMethods>().is_err());
    }

    #[test]
    fn test_message_text() {
        let single = Notification::for_errors("splitmux", &[2], NotificationMethods::default());
        assert_eq!(single.message, "splitmux: ERROR situation detected in terminal #2");
        let many = Notification::for_errors("splitmux", &[1, 3], NotificationMethods::default());
        assert_eq!(many.message, "splitmux: ERROR situations detected in terminals #1, #3");
    }

    #[test]
    fn test_deliver_uses_configured_methods() {
        let notifier = Counting::default();
        let methods = NotificationMethods {
            beep: true,
            system: false,
        };
        Notification::for_errors("splitmux", &[1], methods).deliver(&notifier);
        assert_eq!(notifier.beeps.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.desktops.load(Ordering::SeqCst), 0);
    }
}
