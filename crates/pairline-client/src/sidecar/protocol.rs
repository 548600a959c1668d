//! Sidecar wire protocol: JSON Lines over the child's stdio.
//!
//! - **Commands** (pairline → sidecar) carry a numeric `id`
//! - **Results** (sidecar → pairline) echo that `id`
//! - **Events** (sidecar → pairline) are pushed unsolicited
//!
//! ```json
//! {"type":"send_message","id":3,"to":"628123456@c.us","body":"hi"}
//! {"type":"result","id":3,"ok":false,"error":"not connected"}
//! {"type":"qr","code":"2@AbC..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::client::ClientEvent;

/// Command sent to the sidecar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarCommand {
    /// Start the pairing handshake.
    Initialize {
        /// Request id.
        id: u64,
    },
    /// Deliver a message.
    SendMessage {
        /// Request id.
        id: u64,
        /// Normalized chat address.
        to: String,
        /// Message text.
        body: String,
    },
    /// Sign out of the messaging network.
    Logout {
        /// Request id.
        id: u64,
    },
    /// Release resources and exit.
    Destroy {
        /// Request id.
        id: u64,
    },
}

impl SidecarCommand {
    /// Request id of the command.
    pub fn id(&self) -> u64 {
        match self {
            Self::Initialize { id }
            | Self::SendMessage { id, .. }
            | Self::Logout { id }
            | Self::Destroy { id } => *id,
        }
    }

    /// Wire name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::SendMessage { .. } => "send_message",
            Self::Logout { .. } => "logout",
            Self::Destroy { .. } => "destroy",
        }
    }
}

/// Line received from the sidecar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    /// Outcome of a command.
    Result {
        /// Id of the command being answered.
        id: u64,
        /// Whether the command succeeded.
        ok: bool,
        /// Failure description when `ok` is false.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A pairing code is available.
    Qr {
        /// Raw pairing code.
        code: String,
    },
    /// Pairing accepted.
    Authenticated,
    /// Ready to send.
    Ready,
    /// Pairing rejected.
    AuthFailure {
        /// Reason.
        #[serde(default)]
        message: String,
    },
    /// Connection lost.
    Disconnected {
        /// Reason.
        #[serde(default)]
        reason: String,
    },
}

impl SidecarMessage {
    /// The client event carried by this line, if it is not a result.
    pub fn into_event(self) -> Option<ClientEvent> {
        match self {
            Self::Result { .. } => None,
            Self::Qr { code } => Some(ClientEvent::PairingCode(code)),
            Self::Authenticated => Some(ClientEvent::Authenticated),
            Self::Ready => Some(ClientEvent::Ready),
            Self::AuthFailure { message } => Some(ClientEvent::AuthFailure(message)),
            Self::Disconnected { reason } => Some(ClientEvent::Disconnected(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_wire_format() {
        let cmd = SidecarCommand::SendMessage {
            id: 3,
            to: "628123456@c.us".into(),
            body: "hi".into(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "send_message");
        assert_eq!(json["id"], 3);
        assert_eq!(json["to"], "628123456@c.us");
        assert_eq!(cmd.id(), 3);
    }

    #[test]
    fn parses_result_without_error() {
        let msg: SidecarMessage = serde_json::from_str(r#"{"type":"result","id":1,"ok":true}"#).unwrap();
        assert_eq!(
            msg,
            SidecarMessage::Result {
                id: 1,
                ok: true,
                error: None
            }
        );
        assert!(msg.into_event().is_none());
    }

    #[test]
    fn events_map_to_client_events() {
        let cases = [
            (r#"{"type":"qr","code":"X123"}"#, ClientEvent::PairingCode("X123".into())),
            (r#"{"type":"authenticated"}"#, ClientEvent::Authenticated),
            (r#"{"type":"ready"}"#, ClientEvent::Ready),
            (
                r#"{"type":"auth_failure","message":"bad scan"}"#,
                ClientEvent::AuthFailure("bad scan".into()),
            ),
            (
                r#"{"type":"disconnected","reason":"LOGOUT"}"#,
                ClientEvent::Disconnected("LOGOUT".into()),
            ),
        ];
        for (raw, expected) in cases {
            let msg: SidecarMessage = serde_json::from_str(raw).unwrap();
            assert_eq!(msg.into_event(), Some(expected));
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<SidecarMessage>(r#"{"type":"battery","level":3}"#).is_err());
    }
}
