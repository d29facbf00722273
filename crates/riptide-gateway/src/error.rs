//! Error types for the riptide-gateway crate.

use std::time::Duration;

use thiserror::Error;

use riptide_proto::ProtoError;

use crate::transport::TransportError;

/// Errors surfaced by a gateway session.
///
/// Every fatal or resumable transition produces one of these from the
/// read/process path; callers inspect [`GatewayError::can_resume`] to
/// decide between redialing with the prior session state and constructing
/// a brand-new session identity.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The session is already closed.
    #[error("connection is closed")]
    Closed,

    /// The underlying transport failed or went away.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A payload could not be decoded, or a body had the wrong shape.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// A payload arrived with an opcode the current state cannot accept.
    #[error("unexpected opcode {opcode:?} in {state} state")]
    UnexpectedOpcode {
        /// The offending opcode.
        opcode: riptide_proto::Opcode,
        /// The state that rejected it.
        state: &'static str,
    },

    /// More than one event was lost between consecutive dispatch payloads.
    #[error("sequence skipped: expected {expected}, got {actual}")]
    SequenceSkipped {
        /// The sequence number that should have arrived next.
        expected: i64,
        /// The sequence number that actually arrived.
        actual: i64,
    },

    /// The identify bucket had no slot; the attempt is over.
    #[error("identify rate limited; retry after {retry_after:?}")]
    IdentifyRateLimited {
        /// Time until the next identify slot opens.
        retry_after: Duration,
    },

    /// The gateway closed the connection with a close code.
    #[error("gateway closed the connection: code {code} ({reason})")]
    CloseCode {
        /// The close code from the wire.
        code: u16,
        /// The close reason, possibly empty.
        reason: String,
        /// Whether the code permits resuming the session.
        resumable: bool,
    },

    /// The gateway invalidated the session via an InvalidSession payload.
    #[error("session invalidated by the gateway (resumable: {resumable})")]
    InvalidSession {
        /// Whether the payload body permits resuming.
        resumable: bool,
    },

    /// The gateway asked the client to disconnect and resume.
    #[error("gateway requested a reconnect")]
    ReconnectRequested,

    /// A resume was attempted without a session id.
    #[error("cannot resume without a session id")]
    MissingSessionId,

    /// The session configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether the condition permits resuming the session on a fresh
    /// connection (as opposed to discarding the session identity).
    #[must_use]
    pub const fn can_resume(&self) -> bool {
        match self {
            Self::Transport(_) | Self::SequenceSkipped { .. } | Self::ReconnectRequested => true,
            Self::CloseCode { resumable, .. } | Self::InvalidSession { resumable } => *resumable,
            _ => false,
        }
    }
}
