//! Error taxonomy of the fetch layer.

use jmxlink_protocol::RpcError;

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors surfaced by [`JmxFetcher`](crate::JmxFetcher) operations.
///
/// `Connection` always means the session has been dropped and the next call
/// reconnects. Per-attribute failures never show up here in multi-result
/// calls; they become `ERROR` entries instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Session unusable
    #[error("{message}")]
    Connection {
        /// Description
        message: String,
    },

    /// Operational failure
    #[error("{message}")]
    Operation {
        /// Description
        message: String,
        /// Message of the underlying cause
        cause_message: String,
        /// Remote stack trace, empty unless verbose
        stacktrace: String,
    },
}

impl FetchError {
    /// Connection-class error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Operational error without cause
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
            cause_message: String::new(),
            stacktrace: String::new(),
        }
    }

    /// Operational error with cause and trace
    pub fn with_cause(
        message: impl Into<String>,
        cause_message: impl Into<String>,
        stacktrace: impl Into<String>,
    ) -> Self {
        Self::Operation {
            message: message.into(),
            cause_message: cause_message.into(),
            stacktrace: stacktrace.into(),
        }
    }

    /// Whether the session must be treated as lost
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Top-level message
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message } | Self::Operation { message, .. } => message,
        }
    }
}

impl From<FetchError> for RpcError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Connection { message } => RpcError::Connection { message },
            FetchError::Operation {
                message,
                cause_message,
                stacktrace,
            } => RpcError::Jmx {
                message,
                cause_message,
                stacktrace,
            },
        }
    }
}
