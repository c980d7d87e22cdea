//! Process lifecycle policy: what happens when a pane's command exits.

use std::str::FromStr;
use std::time::Duration;

/// Lifecycle state of a pane's process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// A spawn is in progress.
    Spawning,

    /// The command is running.
    Running,

    /// The command exited and the exit is being handled.
    Exited { code: i32 },

    /// Waiting to respawn.
    Restarting,

    /// Exited for good.
    Terminated { code: i32 },

    /// The command could not be started.
    Failed { error: String },
}

impl ProcessState {
    /// Returns true if the pane's process is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Spawning | Self::Running)
    }
}

/// When to keep the session open after every command has finished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Quit after a short grace period.
    #[default]
    Never,
    /// Keep the session open only if some command failed.
    OnError,
    /// Never quit on its own.
    Always,
}

impl FromStr for WaitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "never" => Ok(Self::Never),
            "error" | "on-error" => Ok(Self::OnError),
            "always" => Ok(Self::Always),
            other => Err(format!("unknown wait policy {other:?}")),
        }
    }
}

/// Global termination counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Terminations {
    /// Commands that exited for good.
    pub total: usize,
    /// Of those, how many exited non-zero.
    pub with_error: usize,
}

impl Terminations {
    /// Count one final exit.
    pub fn record(&mut self, failed: bool) {
        self.total += 1;
        if failed {
            self.with_error += 1;
        }
    }

    /// Withdraw a previously counted exit.
    pub fn withdraw(&mut self, failed: bool) {
        self.total = self.total.saturating_sub(1);
        if failed {
            self.with_error = self.with_error.saturating_sub(1);
        }
    }
}

/// What to do after a pane's command exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitAction {
    /// Spawn the command again right away.
    Respawn,
    /// Spawn the command again after the delay.
    RespawnAfter(Duration),
    /// The pane is done; shut the session down after `shutdown` if set.
    Terminated { shutdown: Option<Duration> },
}

/// Decides restarts and session shutdown.
#[derive(Clone, Copy, Debug)]
pub struct Lifecycle {
    policy: WaitPolicy,
    grace: Duration,
}

impl Lifecycle {
    /// Create a lifecycle manager.
    #[must_use]
    pub fn new(policy: WaitPolicy, grace: Duration) -> Self {
        Self { policy, grace }
    }

    /// Handle an exit of a pane's command.
    ///
    /// `expected` is the number of panes whose commands terminate for good
    /// (those without `restart`).
    pub fn on_exit(
        &self,
        counters: &mut Terminations,
        restart: bool,
        restart_delay: Option<Duration>,
        code: i32,
        expected: usize,
    ) -> ExitAction {
        if restart {
            return match restart_delay {
                Some(delay) if !delay.is_zero() => ExitAction::RespawnAfter(delay),
                _ => ExitAction::Respawn,
            };
        }

        counters.record(code != 0);
        ExitAction::Terminated {
            shutdown: self.shutdown_due(counters, expected),
        }
    }

    /// Grace period before quitting, if the policy says to quit now.
    #[must_use]
    pub fn shutdown_due(&self, counters: &Terminations, expected: usize) -> Option<Duration> {
        if counters.total < expected {
            return None;
        }
        let quit = match self.policy {
            WaitPolicy::Never => true,
            WaitPolicy::OnError => counters.with_error == 0,
            WaitPolicy::Always => false,
        };
        quit.then_some(self.grace)
    }
}

/// Banner written into a pane when its command exits.
#[must_use]
pub fn exit_banner(code: i32) -> Vec<u8> {
    let (color, text) = if code == 0 {
        (32, " PROGRAM TERMINATED ".to_string())
    } else {
        (31, format!(" PROGRAM TERMINATED (code: {code}) "))
    };
    format!("\r\n\x1b[{color};7m ..::\x1b[1m{text}\x1b[22m::.. \x1b[0m\r\n\r\n").into_bytes()
}

/// Banner written into a pane when its command cannot be started.
#[must_use]
pub fn failure_banner(error: &str) -> Vec<u8> {
    format!("\r\n\x1b[31;7m ..::\x1b[1m FAILED TO START: {error} \x1b[22m::.. \x1b[0m\r\n\r\n")
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_secs(2);

    fn exits(policy: WaitPolicy, codes: &[i32]) -> Vec<ExitAction> {
        let lifecycle = Lifecycle::new(policy, GRACE);
        let mut counters = Terminations::default();
        codes
            .iter()
            .map(|&code| lifecycle.on_exit(&mut counters, false, None, code, codes.len()))
            .collect()
    }

    #[test]
    fn test_on_error_all_success_quits() {
        let actions = exits(WaitPolicy::OnError, &[0, 0]);
        assert_eq!(actions[0], ExitAction::Terminated { shutdown: None });
        assert_eq!(
            actions[1],
            ExitAction::Terminated {
                shutdown: Some(GRACE)
            }
        );
    }

    #[test]
    fn test_on_error_with_failure_waits() {
        let actions = exits(WaitPolicy::OnError, &[0, 1]);
        assert_eq!(actions[1], ExitAction::Terminated { shutdown: None });
    }

    #[test]
    fn test_never_quits_even_on_failure() {
        let actions = exits(WaitPolicy::Never, &[2, 1]);
        assert_eq!(
            actions[1],
            ExitAction::Terminated {
                shutdown: Some(GRACE)
            }
        );
    }

    #[test]
    fn test_always_waits() {
        let actions = exits(WaitPolicy::Always, &[0]);
        assert_eq!(actions[0], ExitAction::Terminated { shutdown: None });
    }

    #[test]
    fn test_restart_does_not_count() {
        let lifecycle = Lifecycle::new(WaitPolicy::Never, GRACE);
        let mut counters = Terminations::default();
        assert_eq!(
            lifecycle.on_exit(&mut counters, true, None, 1, 1),
            ExitAction::Respawn
        );
        assert_eq!(
            lifecycle.on_exit(&mut counters, true, Some(Duration::from_millis(300)), 0, 1),
            ExitAction::RespawnAfter(Duration::from_millis(300))
        );
        assert_eq!(
            lifecycle.on_exit(&mut counters, true, Some(Duration::ZERO), 0, 1),
            ExitAction::Respawn
        );
        assert_eq!(counters, Terminations::default());
    }

    #[test]
    fn test_withdraw() {
        let mut counters = Terminations::default();
        counters.record(true);
        counters.record(false);
        counters.withdraw(true);
        assert_eq!(
            counters,
            Terminations {
                total: 1,
                with_error: 0
            }
        );
    }

    #[test]
    fn test_wait_policy_parse() {
        assert_eq!("".parse(), Ok(WaitPolicy::Never));
        assert_eq!("on-error".parse(), Ok(WaitPolicy::OnError));
        assert_eq!("error".parse(), Ok(WaitPolicy::OnError));
        assert_eq!("always".parse(), Ok(WaitPolicy::Always));
        assert!("sometimes".parse::<WaitPolicy>().is_err());
    }

    #[test]
    fn test_banners() {
        let ok = String::from_utf8(exit_banner(0)).unwrap();
        assert!(ok.contains("PROGRAM TERMINATED "));
        assert!(ok.contains("\x1b[32;7m"));
        let failed = String::from_utf8(exit_banner(127)).unwrap();
        assert!(failed.contains("(code: 127)"));
        assert!(failed.contains("\x1b[31;7m"));
    }
}
