//! Client errors.

use jmxlink_protocol::{CodecError, RpcError};
use std::time::Duration;

/// Errors returned by [`crate::JmxClient`] and [`crate::BridgeProcess`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The bridge reported the session unusable; reconnecting may help
    #[error("connection error: {message}")]
    Connection {
        /// Message from the bridge
        message: String,
    },

    /// The bridge reported an operational failure
    #[error("jmx error: {message}, cause: {cause_message}, stacktrace: {stacktrace}")]
    Jmx {
        /// Message from the bridge
        message: String,
        /// Message of the underlying cause
        cause_message: String,
        /// Remote stack trace, empty unless verbose
        stacktrace: String,
    },

    /// The bridge could not decode a request
    #[error("bridge rejected request: {message}")]
    Rejected {
        /// Message from the bridge
        message: String,
    },

    /// Frame encoding or decoding failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Reading or writing the stream failed
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// No response arrived in time
    #[error("no response from bridge within {0:?}")]
    Timeout(Duration),

    /// The response answered a different request
    #[error("response id mismatch: sent {expected}, received {actual}")]
    IdMismatch {
        /// Id of the request
        expected: u64,
        /// Id in the response
        actual: u64,
    },

    /// The response kind does not fit the request
    #[error("unexpected '{kind}' response to '{method}'")]
    UnexpectedResponse {
        /// Request method
        method: &'static str,
        /// Response kind
        kind: &'static str,
    },

    /// The stream is closed or no longer usable
    #[error("bridge connection closed")]
    Closed,

    /// The bridge process could not be started or stopped cleanly
    #[error("bridge process error: {0}")]
    Process(String),
}

impl ClientError {
    /// Whether the bridge reported a connection-class failure.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Whether the bridge reported an operational failure.
    pub fn is_jmx(&self) -> bool {
        matches!(self, Self::Jmx { .. })
    }

    /// Whether the client can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Codec(_) | Self::Io(_) | Self::Timeout(_) | Self::IdMismatch { .. } | Self::Closed
        )
    }
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Connection { message } => Self::Connection { message },
            RpcError::Jmx {
                message,
                cause_message,
                stacktrace,
            } => Self::Jmx {
                message,
                cause_message,
                stacktrace,
            },
            RpcError::InvalidRequest { message } => Self::Rejected { message },
        }
    }
}

/// Result type for client calls
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_mapping() {
        let err = ClientError::from(RpcError::Connection {
            message: "down".to_string(),
        });
        assert!(err.is_connection());
        assert!(!err.is_fatal());

        let err = ClientError::from(RpcError::Jmx {
            message: "can't find mBean: a:b=c".to_string(),
            cause_message: "InstanceNotFoundException".to_string(),
            stacktrace: String::new(),
        });
        assert!(err.is_jmx());
        assert_eq!(
            err.to_string(),
            "jmx error: can't find mBean: a:b=c, cause: InstanceNotFoundException, stacktrace: "
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(ClientError::Closed.is_fatal());
        assert!(ClientError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(
            !ClientError::UnexpectedResponse {
                method: "ping",
                kind: "version"
            }
            .is_fatal()
        );
    }
}
