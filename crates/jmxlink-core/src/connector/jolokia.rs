//! Connector speaking the Jolokia HTTP/JSON protocol.
//!
//! Two addressing modes:
//!
//! - **direct**: the target is an `http(s)://` agent URL, credentials go out
//!   as HTTP basic auth;
//! - **proxy**: the target is a `service:jmx:` URL, every request goes to the
//!   configured agent and carries a `target` object with the JMX URL and
//!   credentials, so the agent opens the JMX connection on our behalf.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Certificate, Client, Identity};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::{
    ConnectionEnv, Connector, ConnectorError, ConnectorResult, Credentials, MBeanAttributeInfo,
    MBeanInfo, MBeanServerConnection, TlsStores,
};
use crate::object_name::ObjectName;
use crate::value::RawValue;

/// Default per-exchange HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Bean read on connect to verify the session.
const PROBE_MBEAN: &str = "JMImplementation:type=MBeanServerDelegate";
const PROBE_ATTRIBUTE: &str = "MBeanServerId";

/// Remote exception types meaning the JMX connection itself failed.
const CONNECTION_ERROR_TYPES: &[&str] = &[
    "java.io.IOException",
    "java.net.ConnectException",
    "java.rmi.ConnectException",
    "java.rmi.ConnectIOException",
    "java.rmi.NoSuchObjectException",
    "javax.naming.CommunicationException",
    "javax.naming.ServiceUnavailableException",
    "org.jboss.remoting3.NotOpenException",
];

/// Jolokia connector settings.
#[derive(Debug, Clone)]
pub struct JolokiaConfig {
    /// Agent used in proxy mode
    pub agent_url: Option<Url>,
    /// Timeout of each HTTP exchange
    pub http_timeout: Duration,
}

impl Default for JolokiaConfig {
    fn default() -> Self {
        Self {
            agent_url: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Opens [`JolokiaSession`]s.
#[derive(Debug, Clone, Default)]
pub struct JolokiaConnector {
    config: JolokiaConfig,
}

impl JolokiaConnector {
    /// Create a connector.
    pub fn new(config: JolokiaConfig) -> Self {
        Self { config }
    }

    fn build_client(&self, tls: Option<&TlsStores>) -> ConnectorResult<Client> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(self.config.http_timeout);

        if let Some(tls) = tls {
            let trust = read_store(&tls.trust_store, "trust")?;
            let cert = Certificate::from_pem(&trust)
                .or_else(|_| Certificate::from_der(&trust))
                .map_err(|e| {
                    ConnectorError::io(format!(
                        "cannot load trust store '{}': {e}",
                        tls.trust_store
                    ))
                })?;
            builder = builder.add_root_certificate(cert);

            let key = read_store(&tls.key_store, "key")?;
            let identity = Identity::from_pem(&key).map_err(|e| {
                ConnectorError::io(format!("cannot load key store '{}': {e}", tls.key_store))
            })?;
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| ConnectorError::io(format!("cannot build HTTP client: {e}")))
    }
}

fn read_store(path: &str, kind: &str) -> ConnectorResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| ConnectorError::io(format!("cannot read {kind} store '{path}': {e}")))
}

#[async_trait]
impl Connector for JolokiaConnector {
    async fn connect(
        &self,
        target: &str,
        env: &ConnectionEnv,
    ) -> ConnectorResult<Box<dyn MBeanServerConnection>> {
        let client = self.build_client(env.tls.as_ref())?;

        let (endpoint, basic_auth, proxy) = if is_agent_url(target) {
            let endpoint = Url::parse(target)
                .map_err(|e| ConnectorError::io(format!("invalid agent URL '{target}': {e}")))?;
            (endpoint, env.credentials.clone(), None)
        } else {
            let endpoint = self.config.agent_url.clone().ok_or_else(|| {
                ConnectorError::io(format!("no Jolokia agent configured to reach '{target}'"))
            })?;
            let proxy = ProxyTarget {
                url: target.to_string(),
                user: env.credentials.as_ref().map(|c| c.username.clone()),
                password: env.credentials.as_ref().map(|c| c.password.clone()),
            };
            (endpoint, None, Some(proxy))
        };

        let mut session = JolokiaSession {
            client,
            endpoint,
            basic_auth,
            proxy,
            include_stacktrace: env.include_stacktrace,
        };

        let probe = ObjectName::parse(PROBE_MBEAN)
            .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
        let id = session.get_attribute(&probe, PROBE_ATTRIBUTE).await?;
        debug!(endpoint = %session.endpoint, server_id = ?id, "Jolokia session opened");

        Ok(Box::new(session))
    }
}

fn is_agent_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

#[derive(Debug, Clone, Serialize)]
struct ProxyTarget {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JolokiaResponse {
    status: u16,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    stacktrace: Option<String>,
}

impl JolokiaResponse {
    fn into_result(self) -> ConnectorResult<Value> {
        if self.status == 200 {
            return Ok(self.value);
        }

        let message = self
            .error
            .unwrap_or_else(|| format!("Jolokia request failed with status {}", self.status));
        let stacktrace = self.stacktrace.unwrap_or_default();
        let error_type = self.error_type.unwrap_or_default();

        if matches!(self.status, 401 | 403) || CONNECTION_ERROR_TYPES.contains(&error_type.as_str()) {
            Err(ConnectorError::Io {
                message,
                stacktrace,
            })
        } else {
            Err(ConnectorError::Remote {
                error_type,
                message,
                stacktrace,
            })
        }
    }
}

/// One logical session against a Jolokia agent.
///
/// Jolokia is stateless over HTTP; the session only carries the client,
/// addressing and credentials.
pub struct JolokiaSession {
    client: Client,
    endpoint: Url,
    basic_auth: Option<Credentials>,
    proxy: Option<ProxyTarget>,
    include_stacktrace: bool,
}

impl std::fmt::Debug for JolokiaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JolokiaSession")
            .field("endpoint", &self.endpoint.as_str())
            .field("proxy_target", &self.proxy.as_ref().map(|p| p.url.as_str()))
            .field("include_stacktrace", &self.include_stacktrace)
            .finish_non_exhaustive()
    }
}

impl JolokiaSession {
    async fn execute(&self, mut request: Value) -> ConnectorResult<Value> {
        if let Some(proxy) = &self.proxy {
            request["target"] = json!(proxy);
        }
        request["config"] = json!({
            "includeStackTrace": if self.include_stacktrace { "true" } else { "false" },
        });
        trace!(request = %request, "Jolokia request");

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(creds) = &self.basic_auth {
            builder = builder.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ConnectorError::io(format!("Jolokia agent unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::io(format!(
                "Jolokia agent returned HTTP {status}"
            )));
        }

        let body: JolokiaResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::Protocol(format!("invalid Jolokia response: {e}")))?;
        body.into_result()
    }
}

#[async_trait]
impl MBeanServerConnection for JolokiaSession {
    async fn query_names(&mut self, pattern: &ObjectName) -> ConnectorResult<Vec<ObjectName>> {
        let value = self
            .execute(json!({ "type": "search", "mbean": pattern.to_string() }))
            .await?;

        let Value::Array(names) = value else {
            return Err(ConnectorError::Protocol(format!(
                "search returned {value} instead of a list"
            )));
        };

        names
            .iter()
            .map(|n| {
                let n = n.as_str().ok_or_else(|| {
                    ConnectorError::Protocol(format!("search returned non-string name {n}"))
                })?;
                ObjectName::parse(n).map_err(|e| ConnectorError::Protocol(e.to_string()))
            })
            .collect()
    }

    async fn get_mbean_info(&mut self, name: &ObjectName) -> ConnectorResult<MBeanInfo> {
        let value = self
            .execute(json!({ "type": "list", "path": list_path(name) }))
            .await?;

        let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default();
        let attributes = value
            .get("attr")
            .and_then(Value::as_object)
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(attr, info)| MBeanAttributeInfo {
                        name: attr.clone(),
                        type_name: info
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        readable: true,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(MBeanInfo {
            class_name: text("class").to_string(),
            description: text("desc").to_string(),
            attributes,
        })
    }

    async fn get_attribute(&mut self, name: &ObjectName, attribute: &str) -> ConnectorResult<RawValue> {
        let value = self
            .execute(json!({
                "type": "read",
                "mbean": name.to_string(),
                "attribute": attribute,
            }))
            .await?;
        Ok(decode_value(value))
    }

    async fn get_attributes(
        &mut self,
        name: &ObjectName,
        attributes: &[String],
    ) -> ConnectorResult<Vec<(String, RawValue)>> {
        let value = self
            .execute(json!({
                "type": "read",
                "mbean": name.to_string(),
                "attribute": attributes,
            }))
            .await?;

        let Value::Object(mut values) = value else {
            return Err(ConnectorError::Protocol(format!(
                "multi-attribute read returned {value} instead of an object"
            )));
        };

        Ok(attributes
            .iter()
            .filter_map(|attr| {
                values
                    .remove(attr)
                    .map(|v| (attr.clone(), decode_value(v)))
            })
            .collect())
    }

    async fn close(&mut self) -> ConnectorResult<()> {
        debug!(endpoint = %self.endpoint, "Jolokia session closed");
        Ok(())
    }
}

/// Path of a bean in a `list` request: escaped domain and canonical key list.
pub fn list_path(name: &ObjectName) -> String {
    fn escape(part: &str) -> String {
        part.replace('!', "!!").replace('/', "!/")
    }
    format!(
        "{}/{}",
        escape(name.domain()),
        escape(&name.canonical_key_list())
    )
}

/// Maps a Jolokia JSON value onto [`RawValue`].
///
/// Integral numbers become `Integer` (values beyond `i64::MAX` wrap), other
/// numbers `Double`. Strings in RFC 3339 form are taken to be serialized
/// dates. Objects (composite data, tabular data and maps alike) become
/// composites; arrays are not supported.
pub fn decode_value(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                RawValue::Integer(i)
            } else if let Some(u) = n.as_u64() {
                RawValue::Integer(u as i64)
            } else {
                n.as_f64()
                    .map_or_else(|| RawValue::Unsupported("number".to_string()), RawValue::Double)
            }
        }
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(date) => RawValue::Date(date.with_timezone(&Utc)),
            Err(_) => RawValue::Str(s),
        },
        Value::Array(_) => RawValue::Unsupported("array".to_string()),
        Value::Object(fields) => RawValue::Composite(
            fields
                .into_iter()
                .map(|(k, v)| (k, decode_value(v)))
                .collect(),
        ),
    }
}
