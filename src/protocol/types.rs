use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default maximum length of a client-chosen peer id (can be overridden per mount)
pub const DEFAULT_MAX_PEER_ID_LENGTH: usize = 64;
/// Longest tag accepted for addon-specific relay frames.
pub const MAX_CUSTOM_TAG_LENGTH: usize = 32;

/// Client-chosen (or server-assigned) identifier naming a signaling session
pub type PeerId = String;
/// Server-generated identifier for one concrete session of a peer id
pub type SessionId = Uuid;

/// Generate a fresh server-assigned peer id.
pub fn generate_peer_id() -> PeerId {
    Uuid::new_v4().to_string()
}

/// Role tag used for discovery: broadcasters originate a stream, receivers consume it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Broadcaster,
    Receiver,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Broadcaster => "broadcaster",
            Self::Receiver => "receiver",
        }
    }

    /// The role a peer of this role discovers on registration.
    pub const fn complement(&self) -> Self {
        match self {
            Self::Broadcaster => Self::Receiver,
            Self::Receiver => Self::Broadcaster,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a relayed signaling frame.
///
/// The well-known kinds carry the WebRTC negotiation (`OFFER`, `ANSWER`,
/// `CANDIDATE`) and PeerJS session teardown (`LEAVE`, `EXPIRE`). Any other
/// tag is carried through as [`RelayKind::Custom`] so addons can piggyback
/// their own message types on the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelayKind {
    Offer,
    Answer,
    Candidate,
    Leave,
    Expire,
    Custom(String),
}

impl RelayKind {
    /// Map a wire tag onto a kind. Unknown tags become `Custom`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "OFFER" => Self::Offer,
            "ANSWER" => Self::Answer,
            "CANDIDATE" => Self::Candidate,
            "LEAVE" => Self::Leave,
            "EXPIRE" => Self::Expire,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::Offer => "OFFER",
            Self::Answer => "ANSWER",
            Self::Candidate => "CANDIDATE",
            Self::Leave => "LEAVE",
            Self::Expire => "EXPIRE",
            Self::Custom(tag) => tag,
        }
    }

    /// Negotiation frames are meaningless without an SDP / ICE payload.
    pub fn requires_payload(&self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::Candidate)
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
