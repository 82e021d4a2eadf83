// Protocol module: signaling frame types, validation, and error codes

pub mod error_codes;
pub mod messages;
pub mod types;
pub mod validation;

pub use error_codes::ErrorCode;

pub use types::{
    generate_peer_id, PeerId, RelayKind, Role, SessionId, DEFAULT_MAX_PEER_ID_LENGTH,
    MAX_CUSTOM_TAG_LENGTH,
};

pub use messages::{
    parse_client_message, ClientMessage, FrameError, OutboundRelay, RelayMessage, ServerMessage,
};

pub use validation::{validate_custom_tag, validate_peer_id};
