//! The transport seam.
//!
//! The session core is transport-agnostic: it consumes and produces
//! discrete [`Frame`]s over anything implementing [`Transport`]. Framing,
//! control frames and dialing live behind this seam; the WebSocket
//! implementation is in [`ws`].

use futures::{Sink, Stream};
use thiserror::Error;

pub mod ws;

/// One discrete message on the gateway connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text payload (one JSON envelope).
    Message(String),
    /// A close frame with its code and reason.
    Close {
        /// The close code.
        code: u16,
        /// The close reason, possibly empty.
        reason: String,
    },
}

/// Errors from the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection is gone.
    #[error("connection closed")]
    Closed,

    /// A forced read deadline fired while tearing down.
    #[error("read timed out")]
    Timeout,

    /// The gateway URL was rejected before dialing.
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),

    /// The WebSocket layer failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A bidirectional stream of [`Frame`]s.
///
/// Blanket-implemented for any `Stream + Sink` pair with the right item
/// and error types, so tests can drive the session with an in-memory
/// transport.
pub trait Transport:
    Stream<Item = Result<Frame, TransportError>>
    + Sink<Frame, Error = TransportError>
    + Unpin
    + Send
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Frame, TransportError>>
        + Sink<Frame, Error = TransportError>
        + Unpin
        + Send
{
}
