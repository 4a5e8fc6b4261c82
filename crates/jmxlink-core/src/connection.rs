//! Session lifecycle: target URL construction, connect, lazy reconnect, disconnect.

use jmxlink_protocol::JmxConfig;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::connector::{ConnectionEnv, Connector, Credentials, MBeanServerConnection, TlsStores};
use crate::error::{FetchError, FetchResult};

/// URI path used when none is configured.
pub const DEFAULT_URI_PATH: &str = "jmxrmi";

/// Builds the JMX service URL for `config`.
///
/// A non-empty `connection_url` wins. Remote mode produces
/// `service:jmx:remote[+http|+https]://host:port[/path/]`, local mode
/// `service:jmx:rmi:///jndi/rmi://host:port/path`.
pub fn build_connection_string(config: &JmxConfig) -> String {
    if !config.connection_url.is_empty() {
        return config.connection_url.clone();
    }

    let uri_path = if config.uri_path.is_empty() {
        DEFAULT_URI_PATH
    } else {
        config.uri_path.as_str()
    };

    if config.is_remote {
        let uri_path = if uri_path == DEFAULT_URI_PATH {
            String::new()
        } else {
            format!("{uri_path}/")
        };
        let protocol = match (config.is_jboss_standalone_mode, config.use_ssl) {
            (true, true) => "remote+https",
            (true, false) => "remote+http",
            (false, _) => "remote",
        };
        return format!(
            "service:jmx:{protocol}://{}:{}{uri_path}",
            config.hostname, config.port
        );
    }

    format!(
        "service:jmx:rmi:///jndi/rmi://{}:{}/{uri_path}",
        config.hostname, config.port
    )
}

/// Builds the session settings for `config`.
///
/// Credentials are set when a username is configured, TLS stores only when
/// both store paths are configured.
pub fn build_connection_env(config: &JmxConfig) -> ConnectionEnv {
    let credentials = (!config.username.is_empty()).then(|| Credentials {
        username: config.username.clone(),
        password: config.password.clone(),
    });

    let tls = (!config.key_store.is_empty() && !config.trust_store.is_empty()).then(|| TlsStores {
        key_store: config.key_store.clone(),
        key_store_password: config.key_store_password.clone(),
        trust_store: config.trust_store.clone(),
        trust_store_password: config.trust_store_password.clone(),
    });

    ConnectionEnv {
        credentials,
        tls,
        include_stacktrace: config.verbose,
    }
}

/// Owns the session handle and the config needed to reopen it.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    config: Option<JmxConfig>,
    session: Option<Box<dyn MBeanServerConnection>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connector", &self.connector)
            .field("configured", &self.config.is_some())
            .field("connected", &self.session.is_some())
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager with no config and no session.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            config: None,
            session: None,
        }
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Config of the last `connect`, if any.
    pub fn config(&self) -> Option<&JmxConfig> {
        self.config.as_ref()
    }

    /// Store `config` and open a session with it.
    ///
    /// The config is kept even when opening fails, so later calls retry.
    ///
    /// # Errors
    ///
    /// Returns a connection error when the connector cannot open the session.
    pub async fn connect(&mut self, config: JmxConfig) -> FetchResult<()> {
        self.config = Some(config.clone());
        self.open(&config).await
    }

    async fn open(&mut self, config: &JmxConfig) -> FetchResult<()> {
        if let Some(mut stale) = self.session.take() {
            if let Err(e) = stale.close().await {
                debug!(error = %e, "closing previous session failed");
            }
        }

        let target = build_connection_string(config);
        let env = build_connection_env(config);

        match self.connector.connect(&target, &env).await {
            Ok(session) => {
                info!(target = %target, "connected to JMX server");
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                let mut message = format!("can't connect to JMX server: '{target}', error: '{e}'");
                if config.verbose && !e.stacktrace().is_empty() {
                    message.push_str(&format!(", stacktrace: '{}'", e.stacktrace()));
                }
                Err(FetchError::connection(message))
            }
        }
    }

    /// Close the session.
    ///
    /// The handle is dropped before closing, so a failed close still leaves
    /// the manager ready to reconnect.
    ///
    /// # Errors
    ///
    /// Returns a connection error when no session is open.
    pub async fn disconnect(&mut self) -> FetchResult<()> {
        let Some(mut session) = self.session.take() else {
            return Err(FetchError::connection(
                "cannot disconnect, connection to JMX endpoint is not established",
            ));
        };
        if let Err(e) = session.close().await {
            debug!(error = %e, "error while closing JMX session");
        }
        info!("disconnected from JMX server");
        Ok(())
    }

    /// Drop the session after an I/O failure, ignoring close errors.
    pub async fn force_disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                debug!(error = %e, "error while closing broken JMX session");
            }
        }
    }

    /// The open session, reconnecting with the stored config if needed.
    ///
    /// # Errors
    ///
    /// Returns a connection error when no config was ever provided or the
    /// reconnect fails.
    pub async fn ensure_connected(&mut self) -> FetchResult<&mut dyn MBeanServerConnection> {
        if self.session.is_none() {
            let Some(config) = self.config.clone() else {
                return Err(FetchError::connection(
                    "failed to get connection to JMX server: configuration not provided",
                ));
            };
            debug!("no open session, reconnecting");
            self.open(&config).await?;
        }

        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(FetchError::connection(
                "connection to JMX endpoint is not established",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryConnector;
    use pretty_assertions::assert_eq;

    fn remote(hostname: &str, port: u16) -> JmxConfig {
        JmxConfig {
            is_remote: true,
            ..JmxConfig::new(hostname, port)
        }
    }

    #[test]
    fn test_connection_string_remote_https() {
        let config = JmxConfig {
            is_jboss_standalone_mode: true,
            use_ssl: true,
            ..remote("test", 123)
        };
        assert_eq!(
            build_connection_string(&config),
            "service:jmx:remote+https://test:123"
        );
    }

    #[test]
    fn test_connection_string_remote_https_with_path() {
        let config = JmxConfig {
            is_jboss_standalone_mode: true,
            use_ssl: true,
            uri_path: "/something".to_string(),
            ..remote("test", 123)
        };
        assert_eq!(
            build_connection_string(&config),
            "service:jmx:remote+https://test:123/something/"
        );
    }

    #[test]
    fn test_connection_string_remote_variants() {
        let plain = remote("test", 123);
        assert_eq!(build_connection_string(&plain), "service:jmx:remote://test:123");

        let http = JmxConfig {
            is_jboss_standalone_mode: true,
            ..remote("test", 123)
        };
        assert_eq!(build_connection_string(&http), "service:jmx:remote+http://test:123");

        let explicit_default = JmxConfig {
            uri_path: DEFAULT_URI_PATH.to_string(),
            ..remote("test", 123)
        };
        assert_eq!(
            build_connection_string(&explicit_default),
            "service:jmx:remote://test:123"
        );
    }

    #[test]
    fn test_connection_string_verbatim_url() {
        let config = JmxConfig {
            connection_url: "service:jmx:rmi:///jndi/rmi://localhost:7199/jmxrmi".to_string(),
            ..remote("ignored", 1)
        };
        assert_eq!(
            build_connection_string(&config),
            "service:jmx:rmi:///jndi/rmi://localhost:7199/jmxrmi"
        );
    }

    #[test]
    fn test_connection_string_local_rmi() {
        assert_eq!(
            build_connection_string(&JmxConfig::new("test", 123)),
            "service:jmx:rmi:///jndi/rmi://test:123/jmxrmi"
        );

        let custom = JmxConfig {
            uri_path: "custom".to_string(),
            ..JmxConfig::new("test", 123)
        };
        assert_eq!(
            build_connection_string(&custom),
            "service:jmx:rmi:///jndi/rmi://test:123/custom"
        );
    }

    #[test]
    fn test_connection_env() {
        let bare = build_connection_env(&JmxConfig::new("h", 1));
        assert_eq!(bare, ConnectionEnv::default());

        let config = JmxConfig {
            username: "admin".to_string(),
            password: "secret".to_string(),
            key_store: "/keys.pem".to_string(),
            verbose: true,
            ..JmxConfig::new("h", 1)
        };
        let env = build_connection_env(&config);
        assert_eq!(env.credentials.as_ref().map(|c| c.username.as_str()), Some("admin"));
        assert!(env.tls.is_none(), "TLS needs both stores");
        assert!(env.include_stacktrace);

        let tls = build_connection_env(&JmxConfig {
            trust_store: "/trust.pem".to_string(),
            ..config
        });
        assert_eq!(tls.tls.map(|t| t.trust_store), Some("/trust.pem".to_string()));
    }

    #[tokio::test]
    async fn test_ensure_connected_without_config() {
        let mut manager = ConnectionManager::new(Arc::new(InMemoryConnector::new()));
        let err = manager.ensure_connected().await.unwrap_err();
        assert_eq!(
            err,
            FetchError::connection("failed to get connection to JMX server: configuration not provided")
        );
    }

    #[tokio::test]
    async fn test_disconnect_requires_session() {
        let mut manager = ConnectionManager::new(Arc::new(InMemoryConnector::new()));
        let err = manager.disconnect().await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(
            err.message(),
            "cannot disconnect, connection to JMX endpoint is not established"
        );
    }

    #[tokio::test]
    async fn test_connect_failure_message_and_retry() {
        let connector = InMemoryConnector::new();
        connector.refuse_connections("Connection refused");
        let mut manager = ConnectionManager::new(Arc::new(connector.clone()));

        let err = manager.connect(JmxConfig::new("localhost", 9999)).await.unwrap_err();
        assert_eq!(
            err.message(),
            "can't connect to JMX server: 'service:jmx:rmi:///jndi/rmi://localhost:9999/jmxrmi', error: 'Connection refused'"
        );
        assert!(!manager.is_connected());

        connector.accept_connections();
        assert!(manager.ensure_connected().await.is_ok());
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_lazy_reconnect_after_disconnect() {
        let connector = InMemoryConnector::new();
        let mut manager = ConnectionManager::new(Arc::new(connector.clone()));

        manager.connect(JmxConfig::new("localhost", 9999)).await.unwrap();
        manager.disconnect().await.unwrap();
        assert!(!manager.is_connected());

        manager.ensure_connected().await.unwrap();
        assert!(manager.is_connected());
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(
            connector.last_target().as_deref(),
            Some("service:jmx:rmi:///jndi/rmi://localhost:9999/jmxrmi")
        );
    }
}
