//! Request/response envelopes exchanged over the frame channel.

use serde::{Deserialize, Serialize};

use crate::config::JmxConfig;
use crate::types::{AttributeResponse, InternalStat};

/// Remote-callable operations.
///
/// Every data operation accepts an optional `timeoutMs` that overrides the
/// default deadline stored by `connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "method",
    content = "params",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    /// Liveness probe
    Ping,
    /// Version of the bridge
    GetClientVersion,
    /// Open a session
    Connect {
        /// Connection settings
        config: JmxConfig,
        /// Deadline for the connect itself
        #[serde(default)]
        timeout_ms: Option<i64>,
    },
    /// Close the session and stop serving
    Disconnect,
    /// Enumerate bean names matching a pattern
    #[serde(rename = "queryMBeanNames")]
    QueryMBeanNames {
        /// Bean name pattern
        pattern: String,
        /// Deadline override
        #[serde(default)]
        timeout_ms: Option<i64>,
    },
    /// Readable attribute names of one bean
    #[serde(rename = "getMBeanAttributeNames")]
    GetMBeanAttributeNames {
        /// Bean name
        mbean_name: String,
        /// Deadline override
        #[serde(default)]
        timeout_ms: Option<i64>,
    },
    /// One attribute of one bean
    #[serde(rename = "getMBeanAttribute")]
    GetMBeanAttribute {
        /// Bean name
        mbean_name: String,
        /// Attribute name
        attribute: String,
        /// Deadline override
        #[serde(default)]
        timeout_ms: Option<i64>,
    },
    /// Several attributes of one bean, all readable ones when empty
    #[serde(rename = "getMBeanAttributes")]
    GetMBeanAttributes {
        /// Bean name
        mbean_name: String,
        /// Attribute names
        #[serde(default)]
        attributes: Vec<String>,
        /// Deadline override
        #[serde(default)]
        timeout_ms: Option<i64>,
    },
    /// Attributes of every bean matching a pattern
    #[serde(rename = "queryMBeanAttributes")]
    QueryMBeanAttributes {
        /// Bean name pattern
        pattern: String,
        /// Attribute names
        #[serde(default)]
        attributes: Vec<String>,
        /// Deadline override
        #[serde(default)]
        timeout_ms: Option<i64>,
    },
    /// Drain recorded internal stats
    GetInternalStats,
}

impl Request {
    /// Wire name of the operation.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::GetClientVersion => "getClientVersion",
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::QueryMBeanNames { .. } => "queryMBeanNames",
            Self::GetMBeanAttributeNames { .. } => "getMBeanAttributeNames",
            Self::GetMBeanAttribute { .. } => "getMBeanAttribute",
            Self::GetMBeanAttributes { .. } => "getMBeanAttributes",
            Self::QueryMBeanAttributes { .. } => "queryMBeanAttributes",
            Self::GetInternalStats => "getInternalStats",
        }
    }
}

/// Typed error carried in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RpcError {
    /// The session is unusable; the caller may reconnect
    #[error("{message}")]
    Connection {
        /// Description
        message: String,
    },
    /// Operational failure
    #[error("{message}")]
    Jmx {
        /// Description
        message: String,
        /// Message of the underlying cause
        #[serde(default)]
        cause_message: String,
        /// Remote stack trace, only when verbose
        #[serde(default)]
        stacktrace: String,
    },
    /// The request frame could not be decoded
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description
        message: String,
    },
}

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "camelCase")]
pub enum Response {
    /// Reply to `ping`
    Pong,
    /// Reply to `getClientVersion`
    Version(String),
    /// Session opened
    Connected,
    /// Session closed
    Disconnected,
    /// Matching bean names
    #[serde(rename = "mbeanNames")]
    MBeanNames(Vec<String>),
    /// Readable attribute names
    AttributeNames(Vec<String>),
    /// Flattened attribute entries
    Attributes(Vec<AttributeResponse>),
    /// Drained stats
    InternalStats(Vec<InternalStat>),
    /// Typed failure
    Error(RpcError),
}

impl Response {
    /// Wire name of the response kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pong => "pong",
            Self::Version(_) => "version",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::MBeanNames(_) => "mbeanNames",
            Self::AttributeNames(_) => "attributeNames",
            Self::Attributes(_) => "attributes",
            Self::InternalStats(_) => "internalStats",
            Self::Error(_) => "error",
        }
    }
}

/// Request with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id, echoed in the response
    pub id: u64,
    /// Operation
    pub request: Request,
}

/// Response with the id of the request it answers.
///
/// Frames that could not be decoded are answered with id `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Id of the answered request
    pub id: u64,
    /// Outcome
    pub response: Response,
}
