//! Pure escalation arithmetic. No clocks, no I/O; everything here is a
//! function of the attempt count and the configured ladder.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::BouncerConfig;

/// What happens to a member whose offer lapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunitiveAction {
    Kick,
    Ban,
}

impl fmt::Display for PunitiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PunitiveAction::Kick => write!(f, "kick"),
            PunitiveAction::Ban => write!(f, "ban"),
        }
    }
}

/// The configured ladder, resolved into durations once at startup.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    base_kick: Duration,
    max_attempts: u32,
    waits: Vec<Duration>,
}

impl EscalationPolicy {
    pub fn new(config: &BouncerConfig) -> Self {
        Self {
            base_kick: config.base_kick(),
            max_attempts: config.max_attempts,
            waits: config.wait_secs.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    /// Cooldown before a member with `attempts` prior lapses may see their
    /// next offer. `None` means no wait: first-time members go straight to
    /// the offer. Counts past the ladder reuse the last rung.
    pub fn wait_duration(&self, attempts: u32) -> Option<Duration> {
        if attempts == 0 {
            return None;
        }
        let idx = ((attempts - 1) as usize).min(self.waits.len().saturating_sub(1));
        self.waits.get(idx).copied()
    }

    /// Decision window for the next offer: the base window scaled by the
    /// attempt the member is about to make, capped at the ladder top.
    pub fn decision_duration(&self, attempts: u32) -> Duration {
        self.base_kick * attempts.saturating_add(1).min(self.max_attempts)
    }

    /// The action a lapse would escalate to, given `attempts` prior lapses.
    pub fn next_action(&self, attempts: u32) -> PunitiveAction {
        if attempts.saturating_add(1) >= self.max_attempts {
            PunitiveAction::Ban
        } else {
            PunitiveAction::Kick
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
