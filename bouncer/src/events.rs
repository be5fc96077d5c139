//! Inbound gateway events.
//!
//! The host process owns the platform session and translates raw gateway
//! traffic into this small vocabulary before feeding it to the runtime.
//! Everything the machine reacts to arrives here; timer expiry is internal
//! and travels on its own channel.

use serde::{Deserialize, Serialize};

use crate::gateway::{ChannelId, MemberId};

/// Component action id carried by the accept button on a role offer.
pub const ACCEPT_ACTION: &str = "accept_role";

/// Where an interaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Button,
    Command,
    Modal,
}

/// One inbound event from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Session is connected and caches are primed. Fired once at startup.
    Started,
    /// A member joined the guild.
    MemberJoined { member: MemberId },
    /// A member used an interactive component or command.
    Interaction {
        kind: InteractionKind,
        member: MemberId,
        action: String,
        channel: ChannelId,
    },
    /// A member's voice connection changed. `previous` and `current` are the
    /// channels before and after; `None` means not connected.
    VoiceState {
        member: MemberId,
        previous: Option<ChannelId>,
        current: Option<ChannelId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = GatewayEvent::Interaction {
            kind: InteractionKind::Button,
            member: MemberId(5),
            action: ACCEPT_ACTION.to_string(),
            channel: ChannelId(100),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"interaction\""), "JSON: {json}");
        assert!(json.contains("\"kind\":\"button\""), "JSON: {json}");

        let parsed: GatewayEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            GatewayEvent::Interaction { action, member, .. } => {
                assert_eq!(action, ACCEPT_ACTION);
                assert_eq!(member, MemberId(5));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_voice_state_serialization() {
        let event = GatewayEvent::VoiceState {
            member: MemberId(5),
            previous: None,
            current: Some(ChannelId(200)),
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: GatewayEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            GatewayEvent::VoiceState {
                previous, current, ..
            } => {
                assert_eq!(previous, None);
                assert_eq!(current, Some(ChannelId(200)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
