//! Transport-level errors of the RPC loop.

use jmxlink_protocol::CodecError;

/// Errors that end the RPC loop.
///
/// Failures of individual requests never show up here; they are answered
/// with an error response and the loop keeps serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Reading or writing the frame stream failed
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A response could not be encoded
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for the RPC loop
pub type ServerResult<T> = Result<T, ServerError>;
