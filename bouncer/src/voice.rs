//! Voice presence: a live role mirror plus debounced arrival notices.
//!
//! The role mirror is unconditional. Whenever a member's voice state
//! changes, the voice role is granted or revoked to match where they are
//! now, cooldown or not. Only the arrival notices are debounced, so one
//! member bouncing in and out of channels cannot flood the notice channel.
//!
//! The channel named as the AFK pen is excluded: sitting there counts as
//! not being in voice at all.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BouncerConfig;
use crate::gateway::{ActionGateway, ChannelId, GatewayError, MemberId, Notice};

/// How a member arrived in a tracked channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrival {
    /// From no voice connection at all.
    Joined(ChannelId),
    /// From the excluded channel.
    Surfaced(ChannelId),
    /// From another tracked channel.
    Moved { from: ChannelId, to: ChannelId },
}

fn is_tracked_channel(afk: ChannelId, channel: ChannelId) -> bool {
    channel != afk
}

/// Classify a voice transition. `None` means nothing worth announcing:
/// leaving voice, entering the excluded channel, or a same-channel update
/// (mute, deafen, stream toggles).
fn classify_arrival(
    afk: ChannelId,
    previous: Option<ChannelId>,
    current: Option<ChannelId>,
) -> Option<Arrival> {
    let to = current.filter(|channel| is_tracked_channel(afk, *channel))?;
    match previous {
        None => Some(Arrival::Joined(to)),
        Some(from) if from == to => None,
        Some(from) if is_tracked_channel(afk, from) => Some(Arrival::Moved { from, to }),
        Some(_) => Some(Arrival::Surfaced(to)),
    }
}

pub struct VoicePresence {
    gateway: Arc<dyn ActionGateway>,
    config: BouncerConfig,
    last_notice: HashMap<MemberId, Instant>,
}

impl VoicePresence {
    pub fn new(gateway: Arc<dyn ActionGateway>, config: &BouncerConfig) -> Self {
        Self {
            gateway,
            config: config.clone(),
            last_notice: HashMap::new(),
        }
    }

    /// React to one voice state change: sync the role first, then post an
    /// arrival notice unless the member announced recently.
    pub async fn voice_state_changed(
        &mut self,
        member: MemberId,
        previous: Option<ChannelId>,
        current: Option<ChannelId>,
    ) -> Result<()> {
        self.sync_role(member, current).await;

        let Some(arrival) = classify_arrival(self.config.afk_channel, previous, current) else {
            return Ok(());
        };

        let now = Instant::now();
        if let Some(last) = self.last_notice.get(&member) {
            if now.duration_since(*last) < self.config.voice_cooldown() {
                debug!(member = %member, "Voice notice suppressed by cooldown");
                return Ok(());
            }
        }

        let notice = match arrival {
            Arrival::Joined(channel) => Notice::VoiceJoined { member, channel },
            Arrival::Surfaced(channel) => Notice::VoiceSurfaced { member, channel },
            Arrival::Moved { from, to } => Notice::VoiceMoved { member, from, to },
        };
        let message = self
            .gateway
            .send_message(self.config.voice_notice_channel, &notice)
            .await
            .context("posting voice notice")?;
        self.last_notice.insert(member, now);
        info!(member = %member, notice = notice.kind(), "Voice arrival announced");

        // Each notice cleans itself up on its own timer.
        let gateway = self.gateway.clone();
        let lifetime = self.config.voice_notice_lifetime();
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            match gateway.delete_message(&message).await {
                Ok(()) | Err(GatewayError::NotFound(_)) => {}
                Err(err) => {
                    warn!(message = %message, error = %err, "Voice notice not deleted");
                }
            }
        });

        Ok(())
    }

    /// Grant or revoke the voice role to match the member's current channel.
    /// Failures are logged and dropped; the next state change retries.
    async fn sync_role(&self, member: MemberId, current: Option<ChannelId>) {
        let in_tracked = current
            .is_some_and(|channel| is_tracked_channel(self.config.afk_channel, channel));
        let result = if in_tracked {
            self.gateway.grant_role(member, self.config.voice_role).await
        } else {
            self.gateway.revoke_role(member, self.config.voice_role).await
        };
        if let Err(err) = result {
            warn!(
                member = %member,
                in_tracked,
                error = %err,
                "Voice role sync failed"
            );
        }
    }

    /// Startup sweep: strip the voice role from anyone who holds it without
    /// actually being in a tracked channel. State changes missed while the
    /// process was down leave exactly this drift behind.
    pub async fn reconcile(&self) -> Result<()> {
        let holders = self
            .gateway
            .members_with_role(self.config.voice_role)
            .await
            .context("listing voice role holders")?;

        let mut drifted = 0usize;
        for member in holders {
            let channel = match self.gateway.voice_channel_of(member).await {
                Ok(channel) => channel,
                Err(err) => {
                    warn!(member = %member, error = %err, "Voice lookup failed during reconcile");
                    continue;
                }
            };
            let present = channel
                .is_some_and(|channel| is_tracked_channel(self.config.afk_channel, channel));
            if present {
                continue;
            }
            match self
                .gateway
                .revoke_role(member, self.config.voice_role)
                .await
            {
                Ok(()) => drifted += 1,
                Err(err) => {
                    warn!(member = %member, error = %err, "Voice role revoke failed during reconcile");
                }
            }
        }

        if drifted > 0 {
            info!(drifted, "Voice role reconciled");
        }
        Ok(())
    }
}
