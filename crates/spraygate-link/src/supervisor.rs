//! Reconnect policy for a dropped serial link.
//!
//! The supervisor is a pure state machine: the processing loop reports
//! connect/disconnect transitions and acts on the returned
//! [`SupervisorAction`]. Keeping the timing decision separate from the I/O
//! makes the backoff schedule directly testable.

use std::time::Duration;
use tracing::{info, warn};

/// What to do about a lost link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Retry with exponential backoff, giving up after `max_attempts`
    /// consecutive failures.
    Backoff {
        base: Duration,
        max: Duration,
        max_attempts: u32,
    },
    /// Never retry automatically; wait for an operator restart.
    Manual,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Backoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Externally visible link health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

/// The loop's next move after a link-loss report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    /// Sleep this long, then attempt to reopen the link.
    RetryAfter(Duration),
    /// The retry budget is exhausted; stop trying.
    GiveUp,
    /// Policy is manual; surface the failure and wait for an operator.
    ManualRestart,
}

/// Tracks consecutive failures and hands out retry delays.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    health: LinkHealth,
    attempt: u32,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            health: LinkHealth::Connected,
            attempt: 0,
        }
    }

    pub fn health(&self) -> LinkHealth {
        self.health
    }

    /// A connection attempt succeeded. Resets the failure streak.
    pub fn on_connected(&mut self) {
        if self.attempt > 0 {
            info!(after_attempts = self.attempt, "serial link restored");
        }
        self.attempt = 0;
        self.health = LinkHealth::Connected;
    }

    /// The link dropped (or a reconnection attempt failed). Returns the
    /// action the processing loop should take next.
    pub fn on_link_lost(&mut self) -> SupervisorAction {
        match self.policy {
            ReconnectPolicy::Manual => {
                self.health = LinkHealth::Failed;
                SupervisorAction::ManualRestart
            }
            ReconnectPolicy::Backoff {
                base,
                max,
                max_attempts,
            } => {
                self.attempt += 1;
                if self.attempt > max_attempts {
                    warn!(attempts = max_attempts, "reconnect budget exhausted");
                    self.health = LinkHealth::Failed;
                    return SupervisorAction::GiveUp;
                }
                let delay = backoff_delay(base, max, self.attempt);
                self.health = LinkHealth::Reconnecting {
                    attempt: self.attempt,
                };
                warn!(attempt = self.attempt, delay_secs = delay.as_secs(), "serial link lost, will retry");
                SupervisorAction::RetryAfter(delay)
            }
        }
    }
}

impl Default for ReconnectSupervisor {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`. The shift
/// saturates so very large attempt counts cannot overflow.
fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let factor = 1u64 << exponent;
    base.checked_mul(factor as u32).unwrap_or(max).min(max)
}
