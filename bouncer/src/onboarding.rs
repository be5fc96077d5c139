//! The per-member onboarding machine.
//!
//! Every member is in exactly one of three situations:
//!
//! - untracked: nothing pending (never joined, resolved, or punished)
//! - waiting: cooling down after earlier lapses, offer not yet posted
//! - deciding: a live role offer with a visible countdown
//!
//! Transitions are driven by join events, the accept interaction, and
//! countdown expiry. All state lives in this struct and is only touched by
//! the runtime's single event loop; countdown tasks communicate through the
//! timer channel and never mutate anything here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BouncerConfig;
use crate::countdown::{CountdownKind, CountdownRegistry, TimerFired, FINAL_MINUTE};
use crate::escalation::{AttemptLedger, EscalationPolicy, PunitiveAction};
use crate::gateway::{ActionGateway, ChannelId, GatewayError, MemberId, MessageRef, Notice};

/// Offers flip to the urgent presentation inside this window.
const URGENT_WINDOW: Duration = Duration::from_secs(5);

/// Which half of the machine a tracked member is in. The deadline here is
/// the single authoritative one; ticks recompute the remaining time from it
/// rather than trusting their own cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting { deadline: Instant },
    Deciding { deadline: Instant },
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    phase: Phase,
    notice: MessageRef,
}

pub struct Onboarding {
    gateway: Arc<dyn ActionGateway>,
    config: BouncerConfig,
    policy: EscalationPolicy,
    ledger: AttemptLedger,
    countdowns: CountdownRegistry,
    tracked: HashMap<MemberId, Tracked>,
}

impl Onboarding {
    /// Build the machine and hand back the receiver its countdown tasks
    /// will report into. The caller owns pumping that channel.
    pub fn new(
        gateway: Arc<dyn ActionGateway>,
        config: &BouncerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (countdowns, timer_events) = CountdownRegistry::new();
        (
            Self {
                gateway,
                config: config.clone(),
                policy: EscalationPolicy::new(config),
                ledger: AttemptLedger::new(),
                countdowns,
                tracked: HashMap::new(),
            },
            timer_events,
        )
    }

    /// A member joined the guild. Clean records go straight to a role offer;
    /// members with prior lapses sit out their waiting period first. A
    /// rejoin mid-phase restarts that phase from scratch.
    pub async fn member_joined(&mut self, member: MemberId) -> Result<()> {
        let attempts = self.ledger.get(member);
        match self.policy.wait_duration(attempts) {
            None => self.begin_offer(member, attempts).await,
            Some(wait) => self.begin_waiting(member, attempts, wait).await,
        }
    }

    /// Route a countdown event. Events from replaced or cancelled countdowns
    /// carry a stale epoch and are dropped here.
    pub async fn handle_timer(&mut self, fired: TimerFired) -> Result<()> {
        match fired {
            TimerFired::Tick { member, epoch, .. } => self.on_tick(member, epoch).await,
            TimerFired::Expired { member, epoch, .. } => self.on_expired(member, epoch).await,
        }
    }

    /// The member pressed accept. Safe to call at any point, any number of
    /// times: an untracked member just gets the role again and a fresh
    /// confirmation.
    pub async fn accept(&mut self, member: MemberId, responder: ChannelId) -> Result<()> {
        self.countdowns.cancel(member);
        self.ledger.reset(member);

        if let Err(err) = self.gateway.grant_role(member, self.config.player_role).await {
            warn!(member = %member, error = %err, "Role grant failed");
            self.gateway
                .send_message(responder, &Notice::AcceptFailed { member })
                .await
                .context("reporting failed grant")?;
            return Ok(());
        }

        if let Some(entry) = self.tracked.remove(&member) {
            self.discard_notice(&entry.notice).await;
        }

        self.gateway
            .send_message(self.config.welcome_channel, &Notice::Welcome { member })
            .await
            .context("posting welcome")?;
        self.gateway
            .send_message(responder, &Notice::AcceptConfirmed { member })
            .await
            .context("confirming accept")?;

        info!(member = %member, "Onboarding resolved, role granted");
        Ok(())
    }

    async fn begin_waiting(
        &mut self,
        member: MemberId,
        attempts: u32,
        wait: Duration,
    ) -> Result<()> {
        let notice = Notice::WaitingPeriod {
            member,
            minutes_left: ceil_minutes(wait),
            attempts,
            max_attempts: self.policy.max_attempts(),
        };
        let message = self
            .gateway
            .send_message(self.config.gate_channel, &notice)
            .await
            .context("posting waiting notice")?;

        let deadline = Instant::now() + wait;
        if let Some(previous) = self.tracked.insert(
            member,
            Tracked {
                phase: Phase::Waiting { deadline },
                notice: message,
            },
        ) {
            self.discard_notice(&previous.notice).await;
        }
        self.countdowns
            .start(member, CountdownKind::Waiting, deadline);

        info!(
            member = %member,
            attempts,
            wait_secs = wait.as_secs(),
            "Waiting period started"
        );
        Ok(())
    }

    async fn begin_offer(&mut self, member: MemberId, attempts: u32) -> Result<()> {
        let window = self.policy.decision_duration(attempts);
        let notice = Notice::RoleOffer {
            member,
            seconds_left: window.as_secs(),
            attempts,
            max_attempts: self.policy.max_attempts(),
            urgent: window <= URGENT_WINDOW,
        };
        let message = self
            .gateway
            .send_message(self.config.gate_channel, &notice)
            .await
            .context("posting role offer")?;

        let deadline = Instant::now() + window;
        if let Some(previous) = self.tracked.insert(
            member,
            Tracked {
                phase: Phase::Deciding { deadline },
                notice: message,
            },
        ) {
            self.discard_notice(&previous.notice).await;
        }
        self.countdowns
            .start(member, CountdownKind::Deciding, deadline);

        info!(
            member = %member,
            attempts,
            window_secs = window.as_secs(),
            "Role offer opened"
        );
        Ok(())
    }

    async fn on_tick(&mut self, member: MemberId, epoch: u64) -> Result<()> {
        if !self.countdowns.is_current(member, epoch) {
            debug!(member = %member, epoch, "Stale tick dropped");
            return Ok(());
        }
        let Some(entry) = self.tracked.get(&member).copied() else {
            self.countdowns.cancel(member);
            return Ok(());
        };

        let attempts = self.ledger.get(member);
        let max_attempts = self.policy.max_attempts();
        let notice = match entry.phase {
            Phase::Waiting { deadline } => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining > FINAL_MINUTE {
                    Notice::WaitingPeriod {
                        member,
                        minutes_left: ceil_minutes(remaining),
                        attempts,
                        max_attempts,
                    }
                } else {
                    Notice::WaitingAlmostOver {
                        member,
                        seconds_left: ceil_secs(remaining),
                        attempts,
                        max_attempts,
                    }
                }
            }
            Phase::Deciding { deadline } => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                Notice::RoleOffer {
                    member,
                    seconds_left: ceil_secs(remaining),
                    attempts,
                    max_attempts,
                    urgent: remaining <= URGENT_WINDOW,
                }
            }
        };

        if let Err(err) = self.gateway.edit_message(&entry.notice, &notice).await {
            warn!(
                member = %member,
                error = %err,
                "Status update failed, countdown abandoned"
            );
            self.countdowns.cancel(member);
        }
        Ok(())
    }

    async fn on_expired(&mut self, member: MemberId, epoch: u64) -> Result<()> {
        if !self.countdowns.is_current(member, epoch) {
            debug!(member = %member, epoch, "Stale expiry dropped");
            return Ok(());
        }
        self.countdowns.cancel(member);

        let Some(entry) = self.tracked.remove(&member) else {
            return Ok(());
        };

        match entry.phase {
            Phase::Waiting { .. } => {
                self.discard_notice(&entry.notice).await;
                let attempts = self.ledger.get(member);
                debug!(member = %member, attempts, "Waiting period over");
                self.begin_offer(member, attempts).await
            }
            Phase::Deciding { .. } => self.resolve_lapsed_offer(member, entry.notice).await,
        }
    }

    /// A role offer ran out. Punish only when the member verifiably still
    /// lacks the role; if we cannot tell, err on the side of doing nothing.
    async fn resolve_lapsed_offer(&mut self, member: MemberId, notice: MessageRef) -> Result<()> {
        match self.gateway.has_role(member, self.config.player_role).await {
            Ok(true) => {
                debug!(member = %member, "Offer lapsed but role already held");
                return Ok(());
            }
            Err(err) => {
                warn!(
                    member = %member,
                    error = %err,
                    "Role check failed at offer expiry, skipping punishment"
                );
                return Ok(());
            }
            Ok(false) => {}
        }

        self.discard_notice(&notice).await;

        let attempts = self.ledger.get(member);
        let action = self.policy.next_action(attempts);
        let recorded = self.ledger.increment(member);

        match action {
            PunitiveAction::Kick => {
                let reason = format!(
                    "Failed to accept role (attempt {recorded}/{})",
                    self.policy.max_attempts()
                );
                match self.gateway.kick_member(member, &reason).await {
                    Ok(()) => info!(member = %member, attempts = recorded, "Member kicked"),
                    Err(err) => warn!(member = %member, error = %err, "Kick failed"),
                }
            }
            PunitiveAction::Ban => {
                match self
                    .gateway
                    .ban_member(member, "Maximum kick attempts reached")
                    .await
                {
                    Ok(()) => {
                        self.ledger.reset(member);
                        info!(member = %member, "Member banned");
                    }
                    Err(err) => warn!(member = %member, error = %err, "Ban failed"),
                }
            }
        }
        Ok(())
    }

    /// Best-effort delete of a superseded status message. Already-gone
    /// messages are fine; anything else is logged and forgotten.
    async fn discard_notice(&self, notice: &MessageRef) {
        match self.gateway.delete_message(notice).await {
            Ok(()) | Err(GatewayError::NotFound(_)) => {}
            Err(err) => {
                warn!(message = %notice, error = %err, "Stale notice not deleted");
            }
        }
    }

    pub fn attempts(&self, member: MemberId) -> u32 {
        self.ledger.get(member)
    }

    pub fn is_tracked(&self, member: MemberId) -> bool {
        self.tracked.contains_key(&member)
    }

    pub fn active_countdowns(&self) -> usize {
        self.countdowns.active_count()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let mut secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs = secs.saturating_add(1);
    }
    secs
}

fn ceil_minutes(duration: Duration) -> u64 {
    ceil_secs(duration).div_ceil(60)
}
