//! The single-consumer event loop.
//!
//! One task owns all machine state and processes gateway events and
//! countdown events strictly one at a time, so no component needs interior
//! locking. Handler errors are logged here and never tear the loop down.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::BouncerConfig;
use crate::countdown::TimerFired;
use crate::events::{GatewayEvent, InteractionKind, ACCEPT_ACTION};
use crate::gateway::ActionGateway;
use crate::onboarding::Onboarding;
use crate::voice::VoicePresence;

pub struct Bouncer {
    onboarding: Onboarding,
    voice: VoicePresence,
    timer_events: mpsc::UnboundedReceiver<TimerFired>,
}

impl Bouncer {
    pub fn new(gateway: Arc<dyn ActionGateway>, config: &BouncerConfig) -> Self {
        let (onboarding, timer_events) = Onboarding::new(gateway.clone(), config);
        let voice = VoicePresence::new(gateway, config);
        Self {
            onboarding,
            voice,
            timer_events,
        }
    }

    /// Run until the gateway event channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<GatewayEvent>) {
        info!("Bouncer running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                Some(fired) = self.timer_events.recv() => self.handle_timer(fired).await,
            }
        }
        info!("Event channel closed, bouncer stopping");
    }

    /// Dispatch one gateway event.
    pub async fn handle_event(&mut self, event: GatewayEvent) {
        debug!(event = ?event, "Gateway event");
        let result = match event {
            GatewayEvent::Started => self.voice.reconcile().await,
            GatewayEvent::MemberJoined { member } => {
                self.onboarding.member_joined(member).await
            }
            GatewayEvent::Interaction {
                kind,
                member,
                action,
                channel,
            } => {
                if kind == InteractionKind::Button && action == ACCEPT_ACTION {
                    self.onboarding.accept(member, channel).await
                } else {
                    Ok(())
                }
            }
            GatewayEvent::VoiceState {
                member,
                previous,
                current,
            } => {
                self.voice
                    .voice_state_changed(member, previous, current)
                    .await
            }
        };
        if let Err(err) = result {
            error!("Event handler failed: {:#}", err);
        }
    }

    async fn handle_timer(&mut self, fired: TimerFired) {
        if let Err(err) = self.onboarding.handle_timer(fired).await {
            error!("Timer handler failed: {:#}", err);
        }
    }

    /// Process every countdown event already queued, without blocking.
    /// Lets tests drive the loop deterministically.
    pub async fn pump_timers(&mut self) {
        while let Ok(fired) = self.timer_events.try_recv() {
            self.handle_timer(fired).await;
        }
    }

    pub fn onboarding(&self) -> &Onboarding {
        &self.onboarding
    }
}
