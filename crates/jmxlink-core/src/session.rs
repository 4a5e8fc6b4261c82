//! Fetch operations against the current session.
//!
//! [`JmxSession`] is owned by the executor worker; nothing else touches the
//! connection. I/O-class connector failures drop the session before the
//! error is reported, so the next call reconnects.

use jmxlink_protocol::{AttributeResponse, JmxConfig};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::ConnectionManager;
use crate::connector::{Connector, ConnectorError};
use crate::error::{FetchError, FetchResult};
use crate::normalize::parse_value;
use crate::object_name::ObjectName;
use crate::stats::SharedStats;

/// Parses a caller-supplied bean name or pattern.
///
/// # Errors
///
/// Returns an operational error naming the expected `DOMAIN:BEAN` shape.
pub fn parse_object_name(name: &str) -> FetchResult<ObjectName> {
    ObjectName::parse(name).map_err(|e| {
        FetchError::with_cause(
            format!("cannot parse MBean glob pattern: '{name}', valid: 'DOMAIN:BEAN'"),
            e.to_string(),
            "",
        )
    })
}

/// `<bean>,attr=<attribute>`
fn qualified_name(bean: &ObjectName, attribute: &str) -> String {
    format!("{bean},attr={attribute}")
}

fn cause_of(err: &ConnectorError, message: String) -> FetchError {
    FetchError::with_cause(message, err.to_string(), err.stacktrace())
}

/// Soft-failure status text for an operational error.
fn status_of(prefix: &str, err: &FetchError) -> String {
    match err {
        FetchError::Operation {
            message,
            cause_message,
            stacktrace,
        } => format!("{prefix}, error: '{message}', cause: '{cause_message}', stacktrace: '{stacktrace}'"),
        FetchError::Connection { message } => format!("{prefix}, error: '{message}'"),
    }
}

/// Connection plus stats, driven one operation at a time.
#[derive(Debug)]
pub struct JmxSession {
    connection: ConnectionManager,
    stats: SharedStats,
}

impl JmxSession {
    /// Create a session with no connection yet.
    pub fn new(connector: Arc<dyn Connector>, stats: SharedStats) -> Self {
        Self {
            connection: ConnectionManager::new(connector),
            stats,
        }
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Reconfigure stats and open a session with `config`.
    ///
    /// # Errors
    ///
    /// Returns a connection error when the session cannot be opened.
    pub async fn connect(&mut self, config: JmxConfig) -> FetchResult<()> {
        self.stats
            .configure(config.enable_internal_stats, config.max_internal_stats_size);

        let stat = self.stats.record("connect");
        let result = self.connection.connect(config).await;
        if result.is_ok() {
            stat.set_successful();
        }
        stat.finish();
        result
    }

    /// Close the session.
    ///
    /// # Errors
    ///
    /// Returns a connection error when no session is open.
    pub async fn disconnect(&mut self) -> FetchResult<()> {
        let stat = self.stats.record("disconnect");
        let result = self.connection.disconnect().await;
        if result.is_ok() {
            stat.set_successful();
        }
        stat.finish();
        result
    }

    /// Beans selected by `pattern`.
    ///
    /// # Errors
    ///
    /// Connection errors for I/O failures, operational errors otherwise.
    pub async fn query_mbeans(&mut self, pattern: &ObjectName) -> FetchResult<Vec<ObjectName>> {
        let stat = self.stats.record("queryMBeans");
        stat.set_mbean(&pattern.to_string());

        let outcome = match self.connection.ensure_connected().await {
            Ok(conn) => conn.query_names(pattern).await,
            Err(e) => {
                stat.finish();
                return Err(e);
            }
        };

        let result = match outcome {
            Ok(names) => {
                stat.set_successful();
                stat.set_response_count(names.len());
                Ok(names)
            }
            Err(e) if e.is_io() => {
                self.connection.force_disconnect().await;
                Err(FetchError::connection(format!(
                    "problem occurred when talking to the JMX server while querying mBeans, error: '{e}'"
                )))
            }
            Err(e) => Err(cause_of(&e, format!("can't get beans for query: {pattern}"))),
        };
        stat.finish();
        result
    }

    /// Names of the beans selected by `pattern`.
    ///
    /// # Errors
    ///
    /// See [`JmxSession::query_mbeans`].
    pub async fn query_mbean_names(&mut self, pattern: &ObjectName) -> FetchResult<Vec<String>> {
        let names = self.query_mbeans(pattern).await?;
        Ok(names.iter().map(ToString::to_string).collect())
    }

    /// Readable attribute names of `bean`.
    ///
    /// # Errors
    ///
    /// Connection errors for I/O failures, operational errors otherwise.
    pub async fn get_mbean_attribute_names(&mut self, bean: &ObjectName) -> FetchResult<Vec<String>> {
        let stat = self.stats.record("getMBeanInfo");
        stat.set_mbean(&bean.to_string());

        let outcome = match self.connection.ensure_connected().await {
            Ok(conn) => conn.get_mbean_info(bean).await,
            Err(e) => {
                stat.finish();
                return Err(e);
            }
        };

        let result = match outcome {
            Ok(info) => {
                stat.set_successful();
                stat.set_response_count(info.attributes.len());
                Ok(info
                    .attributes
                    .into_iter()
                    .filter(|a| a.readable)
                    .map(|a| a.name)
                    .collect())
            }
            Err(e) if e.is_io() => {
                self.connection.force_disconnect().await;
                Err(FetchError::connection(format!(
                    "problem occurred when talking to the JMX server while requesting mBean info, error: '{e}'"
                )))
            }
            Err(e) => Err(cause_of(&e, format!("can't find mBean: {bean}"))),
        };
        stat.finish();
        result
    }

    /// Reads one attribute and appends its normalized entries to `out`.
    async fn fetch_attribute(
        &mut self,
        bean: &ObjectName,
        attribute: &str,
        out: &mut Vec<AttributeResponse>,
    ) -> FetchResult<()> {
        let outcome = self
            .connection
            .ensure_connected()
            .await?
            .get_attribute(bean, attribute)
            .await;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) if e.is_io() => {
                self.connection.force_disconnect().await;
                return Err(FetchError::connection(format!(
                    "can't connect to JMX server, error: '{e}'"
                )));
            }
            Err(e) => {
                return Err(cause_of(
                    &e,
                    format!("can't get attribute: {attribute} for bean: {bean}: "),
                ));
            }
        };

        parse_value(&qualified_name(bean, attribute), &raw, out)
    }

    /// One attribute of `bean`, normalized.
    ///
    /// # Errors
    ///
    /// Every failure propagates, including normalization failures.
    pub async fn get_mbean_attribute(
        &mut self,
        bean: &ObjectName,
        attribute: &str,
    ) -> FetchResult<Vec<AttributeResponse>> {
        let stat = self.stats.record("getAttribute");
        stat.set_mbean(&bean.to_string());
        stat.set_attrs(&[attribute.to_string()]);

        let mut out = Vec::new();
        let result = self.fetch_attribute(bean, attribute, &mut out).await;
        if result.is_ok() {
            stat.set_successful();
            stat.set_response_count(out.len());
        }
        stat.finish();
        result.map(|()| out)
    }

    /// Attributes of `bean`, all readable ones when `attributes` is empty.
    ///
    /// A failed batch read falls back to one read per attribute; per-attribute
    /// failures become `ERROR` entries.
    ///
    /// # Errors
    ///
    /// Connection errors, and failures resolving the attribute names.
    pub async fn get_mbean_attributes(
        &mut self,
        bean: &ObjectName,
        attributes: &[String],
        out: &mut Vec<AttributeResponse>,
    ) -> FetchResult<()> {
        let attributes = if attributes.is_empty() {
            self.get_mbean_attribute_names(bean).await?
        } else {
            attributes.to_vec()
        };

        let stat = self.stats.record("getAttributes");
        stat.set_mbean(&bean.to_string());
        stat.set_attrs(&attributes);

        let outcome = match self.connection.ensure_connected().await {
            Ok(conn) => conn.get_attributes(bean, &attributes).await,
            Err(e) => {
                stat.finish();
                return Err(e);
            }
        };

        let values = match outcome {
            Ok(values) => {
                stat.set_successful();
                stat.set_response_count(values.len());
                stat.finish();
                values
            }
            Err(e) if e.is_io() => {
                stat.finish();
                self.connection.force_disconnect().await;
                return Err(FetchError::connection(format!(
                    "problem occurred when talking to the JMX server while requesting attributes, error: '{e}'"
                )));
            }
            Err(e) => {
                stat.finish();
                debug!(bean = %bean, error = %e, "batch read failed, reading attributes one by one");
                for attribute in &attributes {
                    match self.fetch_attribute(bean, attribute, out).await {
                        Ok(()) => {}
                        Err(err @ FetchError::Connection { .. }) => return Err(err),
                        Err(err) => {
                            warn!(bean = %bean, attribute = %attribute, error = %err, "attribute read failed");
                            out.push(AttributeResponse::error(
                                qualified_name(bean, attribute),
                                status_of("can't get attribute", &err),
                            ));
                        }
                    }
                }
                return Ok(());
            }
        };

        let mut missing: Vec<&String> = attributes.iter().collect();
        for (attribute, raw) in &values {
            if let Some(pos) = missing.iter().position(|m| *m == attribute) {
                missing.remove(pos);
            }
            let name = qualified_name(bean, attribute);
            if let Err(err) = parse_value(&name, raw, out) {
                warn!(attribute = %name, error = %err, "attribute value not usable");
                out.push(AttributeResponse::error(
                    name,
                    status_of("can't parse attribute", &err),
                ));
            }
        }

        for attribute in missing {
            out.push(AttributeResponse::error(
                qualified_name(bean, attribute),
                "failed to retrieve attribute value from server",
            ));
        }
        Ok(())
    }

    /// Attributes of every bean selected by `pattern`.
    ///
    /// A pattern without wildcards is read as exactly one bean without
    /// querying first.
    ///
    /// # Errors
    ///
    /// See [`JmxSession::get_mbean_attributes`].
    pub async fn query_mbean_attributes(
        &mut self,
        pattern: &ObjectName,
        attributes: &[String],
    ) -> FetchResult<Vec<AttributeResponse>> {
        let beans = if pattern.is_pattern() {
            self.query_mbeans(pattern).await?
        } else {
            vec![pattern.clone()]
        };

        let mut out = Vec::new();
        for bean in &beans {
            self.get_mbean_attributes(bean, attributes, &mut out).await?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryConnector;
    use crate::value::RawValue;
    use jmxlink_protocol::{AttributeValue, ResponseType};
    use pretty_assertions::assert_eq;

    const MEMORY: &str = "java.lang:type=Memory";

    fn connector() -> InMemoryConnector {
        let connector = InMemoryConnector::new();
        connector.add_bean(
            MEMORY,
            [
                ("Verbose", RawValue::Bool(false)),
                ("ObjectPendingFinalizationCount", RawValue::Integer(0)),
                ("Load", RawValue::Double(0.5)),
            ],
        );
        connector
    }

    async fn session(connector: &InMemoryConnector) -> JmxSession {
        let mut session = JmxSession::new(Arc::new(connector.clone()), SharedStats::default());
        session.connect(JmxConfig::new("localhost", 9999)).await.unwrap();
        session
    }

    fn name(s: &str) -> ObjectName {
        ObjectName::parse(s).unwrap()
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_object_name_error() {
        let err = parse_object_name("notabean").unwrap_err();
        assert_eq!(
            err.message(),
            "cannot parse MBean glob pattern: 'notabean', valid: 'DOMAIN:BEAN'"
        );
        assert!(!err.is_connection());
    }

    #[tokio::test]
    async fn test_empty_match_is_empty() {
        let connector = connector();
        let mut session = session(&connector).await;
        let names = session.query_mbean_names(&name("nothing.here:*")).await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_batch_success_and_missing_attribute() {
        let connector = connector();
        let mut session = session(&connector).await;

        let mut out = Vec::new();
        session
            .get_mbean_attributes(&name(MEMORY), &strings(&["Verbose", "Nope"]), &mut out)
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![
                AttributeResponse::new(
                    "java.lang:type=Memory,attr=Verbose",
                    AttributeValue::Bool(false)
                ),
                AttributeResponse::error(
                    "java.lang:type=Memory,attr=Nope",
                    "failed to retrieve attribute value from server"
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_per_attribute() {
        let connector = connector();
        connector
            .fail_batch(MEMORY, ConnectorError::remote("javax.management.ReflectionException", "batch"))
            .fail_attribute(
                MEMORY,
                "ObjectPendingFinalizationCount",
                ConnectorError::remote("javax.management.MBeanException", "nope"),
            );
        let mut session = session(&connector).await;

        let mut out = Vec::new();
        session
            .get_mbean_attributes(
                &name(MEMORY),
                &strings(&["Verbose", "ObjectPendingFinalizationCount", "Load"]),
                &mut out,
            )
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].response_type, ResponseType::Bool);
        assert_eq!(out[1].response_type, ResponseType::Error);
        assert_eq!(
            out[1].name,
            "java.lang:type=Memory,attr=ObjectPendingFinalizationCount"
        );
        assert_eq!(
            out[1].status_msg,
            "can't get attribute, error: 'can't get attribute: ObjectPendingFinalizationCount for bean: java.lang:type=Memory: ', cause: 'nope', stacktrace: ''"
        );
        assert_eq!(out[2].as_f64(), Some(0.5));
    }

    #[tokio::test]
    async fn test_batch_io_failure_disconnects() {
        let connector = connector();
        let mut session = session(&connector).await;
        connector.fail_next_call(ConnectorError::io("Connection reset"));

        let mut out = Vec::new();
        let err = session
            .get_mbean_attributes(&name(MEMORY), &strings(&["Verbose"]), &mut out)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FetchError::connection(
                "problem occurred when talking to the JMX server while requesting attributes, error: 'Connection reset'"
            )
        );
        assert!(out.is_empty());
        assert!(!session.is_connected());
        assert_eq!(connector.open_sessions(), 0);

        // next call reconnects
        session
            .get_mbean_attributes(&name(MEMORY), &strings(&["Verbose"]), &mut out)
            .await
            .unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_value_becomes_error_entry() {
        let connector = InMemoryConnector::new();
        connector.add_bean(
            "app:type=Odd",
            [("List", RawValue::Unsupported("array".to_string())), ("Ok", RawValue::Integer(1))],
        );
        let mut session = session(&connector).await;

        let mut out = Vec::new();
        session
            .get_mbean_attributes(&name("app:type=Odd"), &[], &mut out)
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out[0].is_error());
        assert_eq!(
            out[0].status_msg,
            "can't parse attribute, error: 'unsupported data type (array) for bean app:type=Odd,attr=List', cause: '', stacktrace: ''"
        );
        assert_eq!(out[1].as_i64(), Some(1));
    }

    #[tokio::test]
    async fn test_single_attribute_propagates_failures() {
        let connector = connector();
        let mut session = session(&connector).await;

        let out = session
            .get_mbean_attribute(&name(MEMORY), "Load")
            .await
            .unwrap();
        assert_eq!(out[0].as_f64(), Some(0.5));

        let err = session
            .get_mbean_attribute(&name(MEMORY), "Missing")
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "can't get attribute: Missing for bean: java.lang:type=Memory: "
        );
    }

    #[tokio::test]
    async fn test_attribute_names_and_unknown_bean() {
        let connector = connector();
        let mut session = session(&connector).await;

        let mut names = session.get_mbean_attribute_names(&name(MEMORY)).await.unwrap();
        names.sort();
        assert_eq!(names, strings(&["Load", "ObjectPendingFinalizationCount", "Verbose"]));

        let err = session
            .get_mbean_attribute_names(&name("java.lang:type=Nope"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "can't find mBean: java.lang:type=Nope");
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_query_attributes_over_pattern() {
        let connector = connector();
        connector.add_bean(
            "java.lang:type=GarbageCollector,name=G1 Young Generation",
            [("CollectionCount", RawValue::Integer(7))],
        );
        connector.add_bean(
            "java.lang:type=GarbageCollector,name=G1 Old Generation",
            [("CollectionCount", RawValue::Integer(1))],
        );
        let mut session = session(&connector).await;

        let out = session
            .query_mbean_attributes(
                &name("java.lang:type=GarbageCollector,*"),
                &strings(&["CollectionCount"]),
            )
            .await
            .unwrap();

        let mut values: Vec<_> = out.iter().map(|r| (r.name.clone(), r.as_i64())).collect();
        values.sort();
        assert_eq!(
            values,
            vec![
                (
                    "java.lang:type=GarbageCollector,name=G1 Old Generation,attr=CollectionCount"
                        .to_string(),
                    Some(1)
                ),
                (
                    "java.lang:type=GarbageCollector,name=G1 Young Generation,attr=CollectionCount"
                        .to_string(),
                    Some(7)
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_query_attributes_single_bean_skips_query() {
        let connector = connector();
        let mut session = session(&connector).await;
        let out = session
            .query_mbean_attributes(&name(MEMORY), &strings(&["Load"]))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "java.lang:type=Memory,attr=Load");
    }

    #[tokio::test]
    async fn test_stats_recorded_when_enabled() {
        let connector = connector();
        let stats = SharedStats::default();
        let mut session = JmxSession::new(Arc::new(connector.clone()), stats.clone());
        session
            .connect(JmxConfig {
                enable_internal_stats: true,
                ..JmxConfig::new("localhost", 9999)
            })
            .await
            .unwrap();

        session.query_mbean_names(&name("java.lang:*")).await.unwrap();

        let drained = stats.drain().unwrap();
        let kinds: Vec<_> = drained.iter().map(|s| s.stat_type.as_str()).collect();
        assert_eq!(kinds, vec!["connect", "queryMBeans"]);
        assert!(drained.iter().all(|s| s.successful));
        assert_eq!(drained[1].mbean, "java.lang:*");
        assert_eq!(drained[1].response_count, 1);
    }
}
