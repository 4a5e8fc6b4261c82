//! Connection settings sent by the caller with `connect`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JMX connection settings.
///
/// Field names on the wire are camelCase and match the historical config
/// shape (`connectionURL`, `isJBossStandaloneMode`, `useSSL`, ...). Empty
/// strings mean "not set".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JmxConfig {
    /// Full connection URL. When non-empty it is used verbatim and every
    /// host/port/mode field below is ignored.
    #[serde(rename = "connectionURL")]
    pub connection_url: String,
    /// Host of the JMX endpoint.
    pub hostname: String,
    /// Port of the JMX endpoint.
    pub port: u16,
    /// URI path, `jmxrmi` when empty.
    pub uri_path: String,
    /// User name; credentials are only sent when this is non-empty.
    pub username: String,
    /// Password paired with `username`.
    pub password: String,
    /// Client key store path.
    pub key_store: String,
    /// Client key store password.
    pub key_store_password: String,
    /// Trust store path.
    pub trust_store: String,
    /// Trust store password.
    pub trust_store_password: String,
    /// Use the JBoss remoting connector instead of plain RMI.
    pub is_remote: bool,
    /// JBoss standalone mode (`remote+http` / `remote+https`).
    #[serde(rename = "isJBossStandaloneMode")]
    pub is_jboss_standalone_mode: bool,
    /// Select `remote+https` over `remote+http` in standalone mode.
    #[serde(rename = "useSSL")]
    pub use_ssl: bool,
    /// Default deadline for every request in milliseconds, `<= 0` waits forever.
    pub request_timeout_ms: i64,
    /// Attach remote stack traces to errors.
    pub verbose: bool,
    /// Record per-operation internal stats.
    pub enable_internal_stats: bool,
    /// Capacity of the internal stats buffer, values below 1 use the default.
    pub max_internal_stats_size: i64,
}

impl JmxConfig {
    /// Settings for a plain RMI endpoint at `hostname:port`.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            ..Self::default()
        }
    }

    /// Settings that connect to `url` verbatim.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            connection_url: url.into(),
            ..Self::default()
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

impl fmt::Debug for JmxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JmxConfig")
            .field("connection_url", &self.connection_url)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("uri_path", &self.uri_path)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("key_store", &self.key_store)
            .field("key_store_password", &redact(&self.key_store_password))
            .field("trust_store", &self.trust_store)
            .field("trust_store_password", &redact(&self.trust_store_password))
            .field("is_remote", &self.is_remote)
            .field("is_jboss_standalone_mode", &self.is_jboss_standalone_mode)
            .field("use_ssl", &self.use_ssl)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("verbose", &self.verbose)
            .field("enable_internal_stats", &self.enable_internal_stats)
            .field("max_internal_stats_size", &self.max_internal_stats_size)
            .finish()
    }
}
