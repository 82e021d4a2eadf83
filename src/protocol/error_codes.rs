use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling on the signaling socket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Handshake errors (1xxx)
    InvalidKey,
    InvalidPeerId,
    MissingToken,
    DuplicatePeerId,
    TooManyConnections,

    // Frame validation errors (2xxx)
    InvalidMessage,
    UnknownMessageType,
    MissingDestination,
    MissingPayload,
    MessageTooLarge,

    // Relay errors (3xxx)
    PeerNotFound,
    SelfAddressed,

    // Session errors (4xxx)
    SessionReplaced,
    SessionExpired,

    // Server errors (9xxx)
    InternalError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidKey => "The signaling key does not match this server's configured key.",
            Self::InvalidPeerId => {
                "The peer id is invalid. Ids must be non-empty, start with a letter or digit, and stay within the length limit."
            }
            Self::MissingToken => "A session token is required when connecting to the signaling socket.",
            Self::DuplicatePeerId => {
                "Another live session already uses this peer id. Choose a different id or reconnect with the original token."
            }
            Self::TooManyConnections => {
                "Too many connections from your address. Close an existing session before opening another."
            }
            Self::InvalidMessage => "The message could not be parsed as a signaling frame.",
            Self::UnknownMessageType => "The message type is not recognized by this server.",
            Self::MissingDestination => "Relayed messages must name a destination peer in `dst`.",
            Self::MissingPayload => "Offer, answer and candidate messages must carry a payload.",
            Self::MessageTooLarge => {
                "The message size exceeds the maximum allowed limit. Please send a smaller message."
            }
            Self::PeerNotFound => "The destination peer has no live signaling session.",
            Self::SelfAddressed => "A peer cannot relay a message to itself.",
            Self::SessionReplaced => {
                "This session was replaced by a newer connection using the same peer id."
            }
            Self::SessionExpired => "The session was closed after missing heartbeats.",
            Self::InternalError => "An unexpected server error occurred. Please retry later.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
