//! Public operation surface: parse names, then run on the executor.

use jmxlink_protocol::{AttributeResponse, InternalStat, JmxConfig};
use std::sync::Arc;
use tracing::instrument;

use crate::connector::Connector;
use crate::error::FetchResult;
use crate::executor::TimeoutExecutor;
use crate::session::{JmxSession, parse_object_name};
use crate::stats::SharedStats;

/// Version reported by `getClientVersion`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bounded-time JMX operations.
///
/// Bean names are parsed before anything reaches the session, so a
/// malformed name is always an operational error and never disturbs the
/// connection.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use jmxlink_core::{JmxFetcher, JolokiaConnector};
/// use jmxlink_protocol::JmxConfig;
/// use std::sync::Arc;
///
/// let fetcher = JmxFetcher::new(Arc::new(JolokiaConnector::default()));
/// fetcher
///     .connect(JmxConfig::with_url("http://localhost:8778/jolokia"), 5_000)
///     .await?;
/// let heap = fetcher
///     .get_mbean_attributes("java.lang:type=Memory", vec!["HeapMemoryUsage".into()], 5_000)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JmxFetcher {
    executor: TimeoutExecutor,
    stats: SharedStats,
}

impl JmxFetcher {
    /// Create a fetcher; spawns the executor worker on the current runtime.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let stats = SharedStats::default();
        let session = JmxSession::new(connector, stats.clone());
        Self {
            executor: TimeoutExecutor::spawn(session),
            stats,
        }
    }

    /// Bridge version.
    pub fn version(&self) -> &'static str {
        VERSION
    }

    /// Open a session.
    ///
    /// # Errors
    ///
    /// Connection errors, or a timeout.
    #[instrument(skip(self, config), fields(host = %config.hostname, port = config.port))]
    pub async fn connect(&self, config: JmxConfig, timeout_ms: i64) -> FetchResult<()> {
        self.executor
            .execute(timeout_ms, move |session| {
                Box::pin(async move { session.connect(config).await })
            })
            .await
    }

    /// Close the session.
    ///
    /// # Errors
    ///
    /// A connection error when no session is open, or a timeout.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, timeout_ms: i64) -> FetchResult<()> {
        self.executor
            .execute(timeout_ms, |session| {
                Box::pin(async move { session.disconnect().await })
            })
            .await
    }

    /// Names of the beans matching `pattern`.
    ///
    /// # Errors
    ///
    /// Parse, connection and operational errors, or a timeout.
    #[instrument(skip(self))]
    pub async fn query_mbean_names(&self, pattern: &str, timeout_ms: i64) -> FetchResult<Vec<String>> {
        let pattern = parse_object_name(pattern)?;
        self.executor
            .execute(timeout_ms, move |session| {
                Box::pin(async move { session.query_mbean_names(&pattern).await })
            })
            .await
    }

    /// Readable attribute names of `mbean_name`.
    ///
    /// # Errors
    ///
    /// Parse, connection and operational errors, or a timeout.
    #[instrument(skip(self))]
    pub async fn get_mbean_attribute_names(
        &self,
        mbean_name: &str,
        timeout_ms: i64,
    ) -> FetchResult<Vec<String>> {
        let bean = parse_object_name(mbean_name)?;
        self.executor
            .execute(timeout_ms, move |session| {
                Box::pin(async move { session.get_mbean_attribute_names(&bean).await })
            })
            .await
    }

    /// One attribute of `mbean_name`; every failure propagates.
    ///
    /// # Errors
    ///
    /// Parse, connection, read and normalization errors, or a timeout.
    #[instrument(skip(self))]
    pub async fn get_mbean_attribute(
        &self,
        mbean_name: &str,
        attribute: &str,
        timeout_ms: i64,
    ) -> FetchResult<Vec<AttributeResponse>> {
        let bean = parse_object_name(mbean_name)?;
        let attribute = attribute.to_string();
        self.executor
            .execute(timeout_ms, move |session| {
                Box::pin(async move { session.get_mbean_attribute(&bean, &attribute).await })
            })
            .await
    }

    /// Attributes of `mbean_name`, all readable ones when `attributes` is empty.
    ///
    /// # Errors
    ///
    /// Parse and connection errors, or a timeout. Per-attribute failures are
    /// returned as `ERROR` entries.
    #[instrument(skip(self))]
    pub async fn get_mbean_attributes(
        &self,
        mbean_name: &str,
        attributes: Vec<String>,
        timeout_ms: i64,
    ) -> FetchResult<Vec<AttributeResponse>> {
        let bean = parse_object_name(mbean_name)?;
        self.executor
            .execute(timeout_ms, move |session| {
                Box::pin(async move {
                    let mut out = Vec::new();
                    session.get_mbean_attributes(&bean, &attributes, &mut out).await?;
                    Ok(out)
                })
            })
            .await
    }

    /// Attributes of every bean matching `pattern`.
    ///
    /// # Errors
    ///
    /// See [`JmxFetcher::get_mbean_attributes`].
    #[instrument(skip(self))]
    pub async fn query_mbean_attributes(
        &self,
        pattern: &str,
        attributes: Vec<String>,
        timeout_ms: i64,
    ) -> FetchResult<Vec<AttributeResponse>> {
        let pattern = parse_object_name(pattern)?;
        self.executor
            .execute(timeout_ms, move |session| {
                Box::pin(async move { session.query_mbean_attributes(&pattern, &attributes).await })
            })
            .await
    }

    /// Drain the recorded internal stats.
    ///
    /// # Errors
    ///
    /// Fails when stats were not enabled by the last `connect`.
    pub fn internal_stats(&self) -> FetchResult<Vec<InternalStat>> {
        self.stats.drain()
    }
}
