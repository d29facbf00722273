//! Close-code catalog and resume classification.
//!
//! When either side tears a connection down it sends a close code. A small
//! fixed set of codes lets the session be resumed; every other code means
//! the session identity must be discarded and a fresh handshake performed.

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Close codes this client sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum CloseCode {
    /// Clean shutdown; the session must not be resumed.
    Normal = 1000,
    /// Client-initiated restart; the session should be resumed.
    ServiceRestart = 1012,
    /// The gateway hit an unknown error.
    UnknownError = 4000,
    /// The client sent an opcode the gateway does not recognize.
    UnknownOpcode = 4001,
    /// The client sent a payload the gateway could not decode.
    DecodeError = 4002,
    /// A command was sent before identifying.
    NotAuthenticated = 4003,
    /// The token in the identify payload was rejected.
    AuthenticationFailed = 4004,
    /// More than one identify was sent on a connection.
    AlreadyAuthenticated = 4005,
    /// The sequence sent when resuming was invalid.
    InvalidSequence = 4007,
    /// The client sent payloads too quickly.
    RateLimited = 4008,
    /// The session timed out.
    SessionTimedOut = 4009,
    /// An invalid shard was sent in the identify payload.
    InvalidShard = 4010,
    /// The session would have handled too many guilds; sharding is required.
    ShardingRequired = 4011,
    /// An unsupported protocol version was requested.
    InvalidApiVersion = 4012,
    /// The intents bitmask contained an invalid flag.
    InvalidIntents = 4013,
    /// A declared intent is not enabled for this bot.
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Whether a session closed with this code may be resumed.
    #[must_use]
    pub const fn can_resume(self) -> bool {
        matches!(
            self,
            Self::ServiceRestart | Self::UnknownError | Self::SessionTimedOut
        )
    }

    /// Look up a catalogued close code by its wire value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1012 => Some(Self::ServiceRestart),
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimedOut),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    /// The wire value of this close code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Classify a raw close code. Codes outside the catalog are fatal.
#[must_use]
pub fn can_resume_raw(code: u16) -> bool {
    CloseCode::from_u16(code).is_some_and(CloseCode::can_resume)
}
