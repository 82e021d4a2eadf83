use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use thiserror::Error;

use super::error_codes::ErrorCode;
use super::types::{PeerId, RelayKind};
use super::validation::validate_custom_tag;

/// Frame shape as it arrives on the signaling socket, before validation.
#[derive(Debug, Deserialize)]
struct RawClientFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    dst: Option<String>,
    #[serde(default, deserialize_with = "present_payload")]
    payload: Option<Box<RawValue>>,
}

/// `None` only when the key is absent; an explicit `null` is kept verbatim.
fn present_payload<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Validated message sent from a client to the server
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// Keep-alive; refreshes the session's liveness timestamp
    Heartbeat,
    /// A frame to forward to another peer
    Relay(OutboundRelay),
}

/// Relay request as submitted by the originating peer. The origin is
/// implied by the session the frame arrived on.
#[derive(Debug, Clone)]
pub struct OutboundRelay {
    pub kind: RelayKind,
    pub dst: PeerId,
    pub payload: Option<Box<RawValue>>,
}

impl OutboundRelay {
    pub fn from_peer(self, from_peer_id: PeerId) -> RelayMessage {
        RelayMessage {
            kind: self.kind,
            from_peer_id,
            to_peer_id: self.dst,
            payload: self.payload,
        }
    }
}

/// A signaling message in flight between two peers. The payload is kept as
/// raw JSON text and forwarded without re-encoding.
#[derive(Debug, Clone)]
pub struct RelayMessage {
    pub kind: RelayKind,
    pub from_peer_id: PeerId,
    pub to_peer_id: PeerId,
    pub payload: Option<Box<RawValue>>,
}

/// Reasons an inbound frame is rejected before it reaches the dispatcher.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0} frame is missing `dst`")]
    MissingDestination(RelayKind),
    #[error("{0} frame is missing `payload`")]
    MissingPayload(RelayKind),
    #[error("unsupported message type: {0}")]
    UnknownType(String),
    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    TooLarge { size: usize, max: usize },
}

impl FrameError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Malformed(_) => ErrorCode::InvalidMessage,
            Self::MissingDestination(_) => ErrorCode::MissingDestination,
            Self::MissingPayload(_) => ErrorCode::MissingPayload,
            Self::UnknownType(_) => ErrorCode::UnknownMessageType,
            Self::TooLarge { .. } => ErrorCode::MessageTooLarge,
        }
    }
}

/// Parse and validate one text frame from a client.
pub fn parse_client_message(raw_text: &str) -> Result<ClientMessage, FrameError> {
    let frame: RawClientFrame = serde_json::from_str(raw_text)?;

    if frame.kind == "HEARTBEAT" {
        return Ok(ClientMessage::Heartbeat);
    }

    let kind = RelayKind::from_tag(&frame.kind);
    if let RelayKind::Custom(tag) = &kind {
        if validate_custom_tag(tag).is_err() {
            return Err(FrameError::UnknownType(frame.kind));
        }
    }

    let dst = match frame.dst {
        Some(dst) if !dst.is_empty() => dst,
        _ => return Err(FrameError::MissingDestination(kind)),
    };
    if kind.requires_payload() && frame.payload.is_none() {
        return Err(FrameError::MissingPayload(kind));
    }

    Ok(ClientMessage::Relay(OutboundRelay {
        kind,
        dst,
        payload: frame.payload,
    }))
}

/// Message types sent from server to client
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Session accepted; the client may start signaling
    Open,
    /// The requested peer id is held by another live session
    IdTaken { message: String },
    /// Structured error report
    Error {
        message: String,
        error_code: ErrorCode,
    },
    /// The destination `src` of an earlier relay from `dst` is not connected
    Expire { src: PeerId, dst: PeerId },
    /// A frame relayed from another peer
    Relay(RelayMessage),
}

impl ServerMessage {
    pub fn error(error_code: ErrorCode) -> Self {
        Self::Error {
            message: error_code.description().to_string(),
            error_code,
        }
    }

    /// Wire tag of this message.
    pub fn tag(&self) -> &str {
        match self {
            Self::Open => "OPEN",
            Self::IdTaken { .. } => "ID-TAKEN",
            Self::Error { .. } => "ERROR",
            Self::Expire { .. } => "EXPIRE",
            Self::Relay(relay) => relay.kind.as_tag(),
        }
    }
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    msg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
}

impl Serialize for ServerMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.tag())?;
        match self {
            Self::Open => {}
            Self::IdTaken { message } => {
                map.serialize_entry(
                    "payload",
                    &ErrorPayload {
                        msg: message,
                        code: None,
                    },
                )?;
            }
            Self::Error {
                message,
                error_code,
            } => {
                map.serialize_entry(
                    "payload",
                    &ErrorPayload {
                        msg: message,
                        code: Some(*error_code),
                    },
                )?;
            }
            Self::Expire { src, dst } => {
                map.serialize_entry("src", src)?;
                map.serialize_entry("dst", dst)?;
            }
            Self::Relay(relay) => {
                map.serialize_entry("src", &relay.from_peer_id)?;
                map.serialize_entry("dst", &relay.to_peer_id)?;
                if let Some(payload) = &relay.payload {
                    map.serialize_entry("payload", payload)?;
                }
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_frame_parses() {
        let message = parse_client_message(r#"{"type":"HEARTBEAT"}"#).unwrap();
        assert!(matches!(message, ClientMessage::Heartbeat));
    }

    #[test]
    fn offer_keeps_raw_payload_text() {
        let raw = r#"{"type":"OFFER","dst":"A","payload":{"sdp":{"type":"offer","sdp":"v=0\r\n"},"connectionId":"mc_1"}}"#;
        let ClientMessage::Relay(relay) = parse_client_message(raw).unwrap() else {
            panic!("expected relay");
        };
        assert_eq!(relay.kind, RelayKind::Offer);
        assert_eq!(relay.dst, "A");
        assert_eq!(
            relay.payload.as_ref().map(|p| p.get()),
            Some(r#"{"sdp":{"type":"offer","sdp":"v=0\r\n"},"connectionId":"mc_1"}"#)
        );
    }

    #[test]
    fn null_payload_is_present_and_forwarded_as_null() {
        let ClientMessage::Relay(relay) =
            parse_client_message(r#"{"type":"OFFER","dst":"B","payload":null}"#).unwrap()
        else {
            panic!("expected relay");
        };
        assert_eq!(relay.payload.as_ref().map(|p| p.get()), Some("null"));

        let delivered = ServerMessage::Relay(relay.from_peer("A".to_string()));
        assert_eq!(
            serde_json::to_string(&delivered).unwrap(),
            r#"{"type":"OFFER","src":"A","dst":"B","payload":null}"#
        );

        let ClientMessage::Relay(relay) =
            parse_client_message(r#"{"type":"LEAVE","dst":"B"}"#).unwrap()
        else {
            panic!("expected relay");
        };
        assert!(relay.payload.is_none());
    }

    #[test]
    fn negotiation_frames_require_destination_and_payload() {
        let err = parse_client_message(r#"{"type":"ANSWER","payload":{}}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingDestination(RelayKind::Answer)));
        assert_eq!(err.error_code(), ErrorCode::MissingDestination);

        let err = parse_client_message(r#"{"type":"CANDIDATE","dst":"B"}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingPayload(RelayKind::Candidate)));

        let err = parse_client_message(r#"{"type":"OFFER","dst":"","payload":{}}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingDestination(_)));
    }

    #[test]
    fn leave_needs_no_payload() {
        let ClientMessage::Relay(relay) =
            parse_client_message(r#"{"type":"LEAVE","dst":"B"}"#).unwrap()
        else {
            panic!("expected relay");
        };
        assert_eq!(relay.kind, RelayKind::Leave);
        assert!(relay.payload.is_none());
    }

    #[test]
    fn custom_and_malformed_frames() {
        let ClientMessage::Relay(relay) =
            parse_client_message(r#"{"type":"FACE-DATA","dst":"B","payload":[1,2]}"#).unwrap()
        else {
            panic!("expected relay");
        };
        assert_eq!(relay.kind, RelayKind::Custom("FACE-DATA".to_string()));

        let err = parse_client_message(r#"{"type":"OPEN","dst":"B"}"#).unwrap_err();
        assert!(matches!(err, FrameError::UnknownType(_)));

        let err = parse_client_message("not json").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidMessage);

        let err = parse_client_message(r#"{"dst":"B"}"#).unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
    }

    #[test]
    fn server_frames_use_peerjs_shapes() {
        assert_eq!(
            serde_json::to_string(&ServerMessage::Open).unwrap(),
            r#"{"type":"OPEN"}"#
        );
        assert_eq!(
            serde_json::to_string(&ServerMessage::IdTaken {
                message: "ID is taken".to_string()
            })
            .unwrap(),
            r#"{"type":"ID-TAKEN","payload":{"msg":"ID is taken"}}"#
        );
        assert_eq!(
            serde_json::to_string(&ServerMessage::Expire {
                src: "A".to_string(),
                dst: "B".to_string()
            })
            .unwrap(),
            r#"{"type":"EXPIRE","src":"A","dst":"B"}"#
        );

        let value: serde_json::Value =
            serde_json::to_value(ServerMessage::error(ErrorCode::PeerNotFound)).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["payload"]["code"], "PEER_NOT_FOUND");
    }

    #[test]
    fn relayed_frame_embeds_payload_verbatim() {
        let payload = RawValue::from_string(r#"{"candidate":"a=1",  "sdpMid":"0"}"#.to_string())
            .unwrap();
        let message = ServerMessage::Relay(RelayMessage {
            kind: RelayKind::Candidate,
            from_peer_id: "B".to_string(),
            to_peer_id: "A".to_string(),
            payload: Some(payload),
        });
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"type":"CANDIDATE","src":"B","dst":"A","payload":{"candidate":"a=1",  "sdpMid":"0"}}"#
        );
    }
}
