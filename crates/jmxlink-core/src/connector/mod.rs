//! Connector seam between the fetch layer and a management endpoint.
//!
//! A [`Connector`] opens sessions; a session is a boxed
//! [`MBeanServerConnection`] exclusively owned by the connection manager.
//! Failures are classified at this boundary: [`ConnectorError::Io`] means the
//! session can no longer be trusted and must be dropped.

use async_trait::async_trait;
use std::fmt;

use crate::object_name::ObjectName;
use crate::value::RawValue;

pub mod jolokia;

pub use jolokia::{JolokiaConfig, JolokiaConnector};

/// Errors raised by connectors and sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// Transport failure, the session is unusable
    #[error("{message}")]
    Io {
        /// Description
        message: String,
        /// Remote stack trace, if reported
        stacktrace: String,
    },

    /// The endpoint rejected the call
    #[error("{message}")]
    Remote {
        /// Remote exception type
        error_type: String,
        /// Description
        message: String,
        /// Remote stack trace, if reported
        stacktrace: String,
    },

    /// The endpoint answered with something unexpected
    #[error("{0}")]
    Protocol(String),
}

impl ConnectorError {
    /// I/O-class error without stack trace
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            stacktrace: String::new(),
        }
    }

    /// Remote error
    pub fn remote(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            error_type: error_type.into(),
            message: message.into(),
            stacktrace: String::new(),
        }
    }

    /// Whether the session must be dropped
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Remote stack trace, empty when none was reported
    pub fn stacktrace(&self) -> &str {
        match self {
            Self::Io { stacktrace, .. } | Self::Remote { stacktrace, .. } => stacktrace,
            Self::Protocol(_) => "",
        }
    }
}

/// Result type for connector calls
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Key and trust store locations for TLS sessions.
///
/// The HTTP connector loads both stores as unencrypted PEM (the trust store
/// may also be DER), so the password fields are carried through but never
/// read. Encrypted keystores such as JKS or PKCS#12 are not supported.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsStores {
    /// Client key store path, a PEM file holding the certificate and private key
    pub key_store: String,
    /// Client key store password, ignored by the HTTP connector
    pub key_store_password: String,
    /// Trust store path, a PEM or DER certificate
    pub trust_store: String,
    /// Trust store password, ignored by the HTTP connector
    pub trust_store_password: String,
}

impl fmt::Debug for TlsStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsStores")
            .field("key_store", &self.key_store)
            .field("trust_store", &self.trust_store)
            .finish_non_exhaustive()
    }
}

/// Session settings handed to [`Connector::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionEnv {
    /// Credentials, when a username is configured
    pub credentials: Option<Credentials>,
    /// TLS stores, when both paths are configured
    pub tls: Option<TlsStores>,
    /// Ask the endpoint to report stack traces
    pub include_stacktrace: bool,
}

/// Readable attribute metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MBeanAttributeInfo {
    /// Attribute name
    pub name: String,
    /// Declared type, as reported by the endpoint
    pub type_name: String,
    /// Whether the attribute can be read
    pub readable: bool,
}

/// Bean metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MBeanInfo {
    /// Implementation class
    pub class_name: String,
    /// Description
    pub description: String,
    /// Attributes
    pub attributes: Vec<MBeanAttributeInfo>,
}

/// Opens sessions against a target.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Open a session to `target` (a `service:jmx:` or agent URL).
    async fn connect(
        &self,
        target: &str,
        env: &ConnectionEnv,
    ) -> ConnectorResult<Box<dyn MBeanServerConnection>>;
}

/// An open session.
#[async_trait]
pub trait MBeanServerConnection: Send + fmt::Debug {
    /// Names of the beans selected by `pattern`.
    async fn query_names(&mut self, pattern: &ObjectName) -> ConnectorResult<Vec<ObjectName>>;

    /// Metadata of one bean.
    async fn get_mbean_info(&mut self, name: &ObjectName) -> ConnectorResult<MBeanInfo>;

    /// One attribute of one bean.
    async fn get_attribute(&mut self, name: &ObjectName, attribute: &str) -> ConnectorResult<RawValue>;

    /// Several attributes of one bean in a single exchange.
    ///
    /// Attributes the endpoint did not return are simply missing from the
    /// result.
    async fn get_attributes(
        &mut self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ConnectorResult<Vec<(String, RawValue)>>;

    /// Release the session.
    async fn close(&mut self) -> ConnectorResult<()>;
}
