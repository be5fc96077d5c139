//! Platform gateway: the seam between the machine and the chat platform.
//!
//! Every visible effect (role changes, kicks, bans, messages) crosses the
//! [`ActionGateway`] trait. The host process implements it over the real
//! platform client; tests implement it with a recording double. The machine
//! itself never renders text: it hands the gateway a structured [`Notice`]
//! and the implementation decides how that looks on the wire.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Platform identifier for a guild member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub u64);

/// Platform identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub u64);

/// Platform identifier for a text or voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

/// Platform identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a message the machine previously sent. Carries the channel so
/// edits and deletes need no extra lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub id: MessageId,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.id)
    }
}

/// Structured content for every message the machine sends or edits.
///
/// Rendering (embeds, wording, component layout) belongs to the gateway
/// implementation; the machine only decides what to say and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Cooldown before the next role offer, shown in whole minutes.
    WaitingPeriod {
        member: MemberId,
        minutes_left: u64,
        attempts: u32,
        max_attempts: u32,
    },
    /// Final minute of the waiting period, shown in seconds.
    WaitingAlmostOver {
        member: MemberId,
        seconds_left: u64,
        attempts: u32,
        max_attempts: u32,
    },
    /// Open role offer with the accept component and a live countdown.
    /// `urgent` flips the presentation to a higher-alert style.
    RoleOffer {
        member: MemberId,
        seconds_left: u64,
        attempts: u32,
        max_attempts: u32,
        urgent: bool,
    },
    /// Greeting posted after a successful accept.
    Welcome { member: MemberId },
    /// Reply to the accepting member confirming the grant.
    AcceptConfirmed { member: MemberId },
    /// Reply to the accepting member when the grant itself failed.
    AcceptFailed { member: MemberId },
    /// Member connected to voice from nothing.
    VoiceJoined { member: MemberId, channel: ChannelId },
    /// Member came out of the excluded channel into a tracked one.
    VoiceSurfaced { member: MemberId, channel: ChannelId },
    /// Member moved between two tracked channels.
    VoiceMoved {
        member: MemberId,
        from: ChannelId,
        to: ChannelId,
    },
}

impl Notice {
    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Notice::WaitingPeriod { .. } => "waiting_period",
            Notice::WaitingAlmostOver { .. } => "waiting_almost_over",
            Notice::RoleOffer { .. } => "role_offer",
            Notice::Welcome { .. } => "welcome",
            Notice::AcceptConfirmed { .. } => "accept_confirmed",
            Notice::AcceptFailed { .. } => "accept_failed",
            Notice::VoiceJoined { .. } => "voice_joined",
            Notice::VoiceSurfaced { .. } => "voice_surfaced",
            Notice::VoiceMoved { .. } => "voice_moved",
        }
    }
}

/// Failure modes of outbound platform calls.
///
/// `NotFound` covers the already-gone cases (message deleted out from under
/// us, member left mid-flight); callers on best-effort paths absorb it
/// silently rather than logging.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transient platform failure: {0}")]
    Transient(String),

    #[error("missing permission or privileged target: {0}")]
    Permission(String),

    #[error("target no longer exists: {0}")]
    NotFound(String),
}

/// Outbound platform effects, one method per discrete action.
///
/// Every call is best-effort from the machine's point of view: failures are
/// handled at each call site and never unwind into the event loop.
#[async_trait]
pub trait ActionGateway: Send + Sync {
    async fn grant_role(&self, member: MemberId, role: RoleId) -> Result<(), GatewayError>;

    async fn revoke_role(&self, member: MemberId, role: RoleId) -> Result<(), GatewayError>;

    async fn kick_member(&self, member: MemberId, reason: &str) -> Result<(), GatewayError>;

    async fn ban_member(&self, member: MemberId, reason: &str) -> Result<(), GatewayError>;

    async fn send_message(
        &self,
        channel: ChannelId,
        notice: &Notice,
    ) -> Result<MessageRef, GatewayError>;

    async fn edit_message(&self, message: &MessageRef, notice: &Notice)
        -> Result<(), GatewayError>;

    async fn delete_message(&self, message: &MessageRef) -> Result<(), GatewayError>;

    /// Whether the member currently holds the role.
    async fn has_role(&self, member: MemberId, role: RoleId) -> Result<bool, GatewayError>;

    /// All members currently holding the role.
    async fn members_with_role(&self, role: RoleId) -> Result<Vec<MemberId>, GatewayError>;

    /// The voice channel the member is connected to, if any.
    async fn voice_channel_of(&self, member: MemberId)
        -> Result<Option<ChannelId>, GatewayError>;
}
