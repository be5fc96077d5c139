//! Per-member countdowns.
//!
//! Each countdown is one spawned task that owns nothing but a deadline and
//! a sender. Tasks never touch shared state; they emit [`TimerFired`] events
//! into the runtime's channel and the single consumer does all mutation.
//!
//! Replacing or cancelling a countdown cannot race its events: every event
//! carries the epoch it was armed under, and the consumer drops events whose
//! epoch no longer matches the registry. A cancelled task may already have a
//! tick in flight; the stale epoch makes it inert.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

use crate::gateway::MemberId;

/// Tick cadence switches from minutes to seconds inside this window.
pub const FINAL_MINUTE: Duration = Duration::from_secs(60);

/// Which kind of countdown a member is under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownKind {
    /// Cooldown before the next role offer.
    Waiting,
    /// Open role offer awaiting an accept.
    Deciding,
}

impl std::fmt::Display for CountdownKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountdownKind::Waiting => write!(f, "waiting"),
            CountdownKind::Deciding => write!(f, "deciding"),
        }
    }
}

/// Event emitted by a countdown task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFired {
    /// Time remains; the consumer should refresh the visible countdown.
    Tick {
        member: MemberId,
        kind: CountdownKind,
        epoch: u64,
    },
    /// The deadline passed.
    Expired {
        member: MemberId,
        kind: CountdownKind,
        epoch: u64,
    },
}

#[derive(Debug)]
struct Countdown {
    epoch: u64,
    handle: JoinHandle<()>,
}

/// At most one live countdown per member, each stamped with a fresh epoch.
#[derive(Debug)]
pub struct CountdownRegistry {
    events: mpsc::UnboundedSender<TimerFired>,
    active: HashMap<MemberId, Countdown>,
    next_epoch: u64,
}

impl CountdownRegistry {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                active: HashMap::new(),
                next_epoch: 0,
            },
            rx,
        )
    }

    /// Arm a countdown toward `deadline`, replacing any countdown the member
    /// already has. Returns the new epoch.
    pub fn start(&mut self, member: MemberId, kind: CountdownKind, deadline: Instant) -> u64 {
        self.cancel(member);

        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let handle = tokio::spawn(run_countdown(
            member,
            kind,
            epoch,
            deadline,
            self.events.clone(),
        ));
        self.active.insert(member, Countdown { epoch, handle });
        debug!(member = %member, kind = %kind, epoch, "Countdown armed");
        epoch
    }

    /// Stop a member's countdown if one is live. Idempotent; returns whether
    /// anything was cancelled.
    pub fn cancel(&mut self, member: MemberId) -> bool {
        match self.active.remove(&member) {
            Some(countdown) => {
                countdown.handle.abort();
                debug!(member = %member, epoch = countdown.epoch, "Countdown cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether an event stamped with `epoch` belongs to the member's live
    /// countdown. Stale events fail this check and must be dropped.
    pub fn is_current(&self, member: MemberId, epoch: u64) -> bool {
        self.active
            .get(&member)
            .is_some_and(|countdown| countdown.epoch == epoch)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

/// Body of a countdown task. Sleeps are always recomputed from the absolute
/// deadline, so wall-clock delays in processing shorten later intervals
/// instead of pushing the deadline out.
async fn run_countdown(
    member: MemberId,
    kind: CountdownKind,
    epoch: u64,
    deadline: Instant,
    events: mpsc::UnboundedSender<TimerFired>,
) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            let _ = events.send(TimerFired::Expired {
                member,
                kind,
                epoch,
            });
            return;
        }

        let remaining = deadline - now;
        let step = match kind {
            CountdownKind::Waiting if remaining > FINAL_MINUTE => Duration::from_secs(60),
            _ => Duration::from_secs(1),
        };
        sleep_until(deadline.min(now + step)).await;

        if Instant::now() >= deadline {
            let _ = events.send(TimerFired::Expired {
                member,
                kind,
                epoch,
            });
            return;
        }
        let _ = events.send(TimerFired::Tick {
            member,
            kind,
            epoch,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::yield_now;

    /// Let a freshly spawned countdown task park on its first sleep before
    /// the clock moves.
    async fn settle() {
        for _ in 0..4 {
            yield_now().await;
        }
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<TimerFired>) -> Vec<TimerFired> {
        settle().await;
        let mut out = Vec::new();
        while let Ok(fired) = rx.try_recv() {
            out.push(fired);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_deciding_ticks_each_second_then_expires() {
        let (mut registry, mut rx) = CountdownRegistry::new();
        let member = MemberId(1);
        let epoch = registry.start(
            member,
            CountdownKind::Deciding,
            Instant::now() + Duration::from_secs(3),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            drain(&mut rx).await,
            vec![TimerFired::Tick {
                member,
                kind: CountdownKind::Deciding,
                epoch
            }]
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            drain(&mut rx).await,
            vec![TimerFired::Tick {
                member,
                kind: CountdownKind::Deciding,
                epoch
            }]
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            drain(&mut rx).await,
            vec![TimerFired::Expired {
                member,
                kind: CountdownKind::Deciding,
                epoch
            }]
        );

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(drain(&mut rx).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_switches_to_seconds_inside_final_minute() {
        let (mut registry, mut rx) = CountdownRegistry::new();
        let member = MemberId(1);
        registry.start(
            member,
            CountdownKind::Waiting,
            Instant::now() + Duration::from_secs(150),
        );
        settle().await;

        // Minute cadence while far out.
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(drain(&mut rx).await.len(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(drain(&mut rx).await.len(), 1);

        // 30s remain; the task is now on a one-second step.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut rx).await.len(), 1);

        tokio::time::advance(Duration::from_secs(29)).await;
        let events = drain(&mut rx).await;
        assert!(matches!(events.last(), Some(TimerFired::Expired { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_bumps_epoch() {
        let (mut registry, _rx) = CountdownRegistry::new();
        let member = MemberId(1);

        let first = registry.start(
            member,
            CountdownKind::Deciding,
            Instant::now() + Duration::from_secs(20),
        );
        let second = registry.start(
            member,
            CountdownKind::Waiting,
            Instant::now() + Duration::from_secs(600),
        );

        assert!(second > first);
        assert!(!registry.is_current(member, first));
        assert!(registry.is_current(member, second));
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (mut registry, _rx) = CountdownRegistry::new();
        let member = MemberId(1);
        registry.start(
            member,
            CountdownKind::Deciding,
            Instant::now() + Duration::from_secs(20),
        );

        assert!(registry.cancel(member));
        assert!(!registry.cancel(member));
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_countdown_emits_nothing() {
        let (mut registry, mut rx) = CountdownRegistry::new();
        let member = MemberId(1);
        registry.start(
            member,
            CountdownKind::Deciding,
            Instant::now() + Duration::from_secs(3),
        );
        settle().await;
        registry.cancel(member);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(drain(&mut rx).await.is_empty());
    }
}
