//! Error types for the riptide-proto crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol payloads.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode a payload.
    #[error("encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    /// Failed to decode a payload.
    #[error("decoding error: {0}")]
    Decoding(#[source] serde_json::Error),

    /// A payload body did not have the shape its opcode requires.
    #[error("malformed {context} body: {reason}")]
    MalformedBody {
        /// Which payload body was malformed.
        context: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}
