//! bouncer: onboarding gatekeeper with escalating enforcement and voice
//! presence sync.
//!
//! New members get a timed offer to accept the player role. Letting the
//! offer lapse gets them kicked; repeat offenders wait longer between
//! offers, face shrinking patience, and are eventually banned. A separate
//! component mirrors live voice presence onto a role and posts debounced
//! arrival notices.
//!
//! The crate is platform-agnostic. The host process owns the actual chat
//! platform session, translates its traffic into [`GatewayEvent`] values,
//! implements [`ActionGateway`] over its client, and hands both to
//! [`Bouncer::run`].

pub mod config;
pub mod countdown;
pub mod escalation;
pub mod events;
pub mod gateway;
pub mod onboarding;
pub mod runtime;
pub mod voice;

// Re-export configuration types
pub use config::{BouncerConfig, ConfigError};

// Re-export countdown types
pub use countdown::{CountdownKind, CountdownRegistry, TimerFired};

// Re-export escalation types
pub use escalation::{AttemptLedger, EscalationPolicy, PunitiveAction};

// Re-export event types
pub use events::{GatewayEvent, InteractionKind, ACCEPT_ACTION};

// Re-export gateway types
pub use gateway::{
    ActionGateway, ChannelId, GatewayError, MemberId, MessageId, MessageRef, Notice, RoleId,
};

// Re-export the machine components
pub use onboarding::Onboarding;
pub use runtime::Bouncer;
pub use voice::VoicePresence;
