//! Error detection over live pane output.
//!
//! Every tick, panes that produced output since the previous tick have their
//! visible screen matched against the global and the pane-local pattern
//! lists. Panes whose error state flips are re-rendered, and a debounced
//! notification is raised when the set of erroring screens changes.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::{Error, Result};
use crate::notify::{Notification, NotificationMethods};
use crate::pane::PaneState;

/// One item of a pattern list.
#[derive(Clone, Debug)]
struct Pattern {
    regex: Regex,
    negate: bool,
}

/// Comma separated list of regular expressions, each optionally negated with
/// a leading `!`. `\,` is a literal comma inside an item.
///
/// A list matches a line when every item agrees with it.
#[derive(Clone, Debug, Default)]
pub struct PatternList {
    items: Vec<Pattern>,
}

impl PatternList {
    /// Parse and compile a pattern list.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] if an item is not a valid regex.
    pub fn parse(text: &str) -> Result<Self> {
        let items = split_items(text)
            .into_iter()
            .map(|item| {
                let (negate, pattern) = match item.strip_prefix('!') {
                    Some(rest) if !rest.is_empty() => (true, rest.to_string()),
                    _ => (false, item),
                };
                Regex::new(&pattern)
                    .map(|regex| Pattern { regex, negate })
                    .map_err(|source| Error::InvalidPattern { pattern, source })
            })
            .collect::<Result<_>>()?;
        Ok(Self { items })
    }

    /// Whether the list has no items. An empty list never matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether every item agrees with `line`.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|p| p.regex.is_match(line) != p.negate)
    }

    /// Whether any of the lines matches.
    #[must_use]
    pub fn matches_any<'a>(&self, mut lines: impl Iterator<Item = &'a str>) -> bool {
        !self.is_empty() && lines.any(|line| self.matches(line))
    }
}

impl FromStr for PatternList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn split_items(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items.retain(|item| !item.is_empty());
    items
}

/// Outcome of one monitor tick.
#[derive(Debug, Default)]
pub struct MonitorReport {
    /// Some pane changed error state and must be redrawn.
    pub dirty: bool,
    /// Panes found in error during this tick (1-based indices).
    pub erroring: Vec<usize>,
    /// Notification to deliver, if one is due.
    pub notification: Option<Notification>,
}

/// Scans pane output for error patterns and debounces notifications.
#[derive(Debug)]
pub struct ErrorMonitor {
    /// Application name used in notification texts.
    name: String,
    /// Patterns applied to every pane.
    global: PatternList,
    /// How to notify.
    methods: NotificationMethods,
    /// Quiet period after a notification.
    lock: Duration,
    /// No notifications before this instant.
    locked_until: Option<Instant>,
    /// Screens of erroring panes, as of the latest scans.
    current: BTreeMap<usize, String>,
    /// Snapshot that was last notified about.
    delivered: BTreeMap<usize, String>,
}

impl ErrorMonitor {
    /// Create a monitor.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        global: PatternList,
        methods: NotificationMethods,
        lock: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            global,
            methods,
            lock,
            locked_until: None,
            current: BTreeMap::new(),
            delivered: BTreeMap::new(),
        }
    }

    /// Whether notifications are currently suppressed.
    #[must_use]
    pub fn is_locked(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Run one scan over the panes.
    pub fn tick(&mut self, panes: &mut [PaneState], now: Instant) -> MonitorReport {
        let mut report = MonitorReport::default();

        for pane in panes.iter_mut() {
            if !pane.pending_update {
                continue;
            }
            pane.pending_update = false;

            if self.global.is_empty() && pane.local_patterns.is_empty() {
                continue;
            }

            let screenshot = pane.screenshot();
            let error = self.global.matches_any(screenshot.lines())
                || pane.local_patterns.matches_any(screenshot.lines());

            if error != pane.error {
                tracing::debug!("pane {} error state -> {}", pane.index, error);
                pane.error = error;
                report.dirty = true;
            }

            if error {
                self.current.insert(pane.index, screenshot);
                report.erroring.push(pane.index);
            } else {
                self.current.remove(&pane.index);
            }
        }

        if !self.methods.is_empty()
            && !report.erroring.is_empty()
            && !self.is_locked(now)
            && self.current != self.delivered
        {
            report.notification = Some(Notification::for_errors(
                &self.name,
                &report.erroring,
                self.methods,
            ));
            self.delivered = self.current.clone();
            self.locked_until = Some(now + self.lock);
        }

        report
    }
}
