//! Maps RPC requests onto fetcher operations.

use jmxlink_core::JmxFetcher;
use jmxlink_protocol::{Request, Response, RpcError};
use tracing::{debug, info};

/// What the loop does after answering a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep serving
    Continue,
    /// Flush the response and stop
    Stop,
}

/// Dispatches requests to a [`JmxFetcher`].
///
/// `connect` stores the config's request timeout as the default deadline for
/// every later call; a call's own `timeoutMs` overrides it.
#[derive(Debug)]
pub struct JmxServiceHandler {
    fetcher: JmxFetcher,
    default_timeout_ms: i64,
}

impl JmxServiceHandler {
    /// Create a handler; calls wait forever until `connect` sets a deadline.
    pub fn new(fetcher: JmxFetcher) -> Self {
        Self {
            fetcher,
            default_timeout_ms: 0,
        }
    }

    /// Default deadline in milliseconds.
    pub fn default_timeout_ms(&self) -> i64 {
        self.default_timeout_ms
    }

    fn deadline(&self, timeout_ms: Option<i64>) -> i64 {
        timeout_ms.unwrap_or(self.default_timeout_ms)
    }

    /// Close the session if one is open, ignoring errors.
    pub async fn shutdown(&self) {
        if let Err(e) = self.fetcher.disconnect(self.default_timeout_ms).await {
            debug!(error = %e, "disconnect on shutdown");
        }
    }

    /// Answer one request.
    pub async fn handle(&mut self, request: Request) -> (Response, Flow) {
        debug!(method = request.method(), "dispatching request");

        let response = match request {
            Request::Ping => Response::Pong,
            Request::GetClientVersion => Response::Version(self.fetcher.version().to_string()),
            Request::Connect { config, timeout_ms } => {
                self.default_timeout_ms = config.request_timeout_ms;
                let deadline = timeout_ms.unwrap_or(config.request_timeout_ms);
                respond(self.fetcher.connect(config, deadline).await, |()| Response::Connected)
            }
            Request::Disconnect => {
                info!("disconnect requested, stopping after reply");
                let response = respond(
                    self.fetcher.disconnect(self.default_timeout_ms).await,
                    |()| Response::Disconnected,
                );
                return (response, Flow::Stop);
            }
            Request::QueryMBeanNames {
                pattern,
                timeout_ms,
            } => respond(
                self.fetcher
                    .query_mbean_names(&pattern, self.deadline(timeout_ms))
                    .await,
                Response::MBeanNames,
            ),
            Request::GetMBeanAttributeNames {
                mbean_name,
                timeout_ms,
            } => respond(
                self.fetcher
                    .get_mbean_attribute_names(&mbean_name, self.deadline(timeout_ms))
                    .await,
                Response::AttributeNames,
            ),
            Request::GetMBeanAttribute {
                mbean_name,
                attribute,
                timeout_ms,
            } => respond(
                self.fetcher
                    .get_mbean_attribute(&mbean_name, &attribute, self.deadline(timeout_ms))
                    .await,
                Response::Attributes,
            ),
            Request::GetMBeanAttributes {
                mbean_name,
                attributes,
                timeout_ms,
            } => respond(
                self.fetcher
                    .get_mbean_attributes(&mbean_name, attributes, self.deadline(timeout_ms))
                    .await,
                Response::Attributes,
            ),
            Request::QueryMBeanAttributes {
                pattern,
                attributes,
                timeout_ms,
            } => respond(
                self.fetcher
                    .query_mbean_attributes(&pattern, attributes, self.deadline(timeout_ms))
                    .await,
                Response::Attributes,
            ),
            Request::GetInternalStats => {
                respond(self.fetcher.internal_stats(), Response::InternalStats)
            }
        };

        (response, Flow::Continue)
    }
}

fn respond<T>(
    result: jmxlink_core::FetchResult<T>,
    ok: impl FnOnce(T) -> Response,
) -> Response {
    match result {
        Ok(value) => ok(value),
        Err(e) => {
            debug!(error = %e, "request failed");
            Response::Error(RpcError::from(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmxlink_core::RawValue;
    use jmxlink_core::testing::InMemoryConnector;
    use jmxlink_protocol::JmxConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn handler(connector: &InMemoryConnector) -> JmxServiceHandler {
        JmxServiceHandler::new(JmxFetcher::new(Arc::new(connector.clone())))
    }

    #[tokio::test]
    async fn test_ping_and_version() {
        let mut handler = handler(&InMemoryConnector::new());
        assert_eq!(handler.handle(Request::Ping).await, (Response::Pong, Flow::Continue));
        assert_eq!(
            handler.handle(Request::GetClientVersion).await.0,
            Response::Version(jmxlink_core::VERSION.to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_stores_default_timeout() {
        let mut handler = handler(&InMemoryConnector::new());
        let (response, flow) = handler
            .handle(Request::Connect {
                config: JmxConfig {
                    request_timeout_ms: 2_500,
                    ..JmxConfig::new("localhost", 9999)
                },
                timeout_ms: None,
            })
            .await;
        assert_eq!(response, Response::Connected);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(handler.default_timeout_ms(), 2_500);
    }

    #[tokio::test]
    async fn test_errors_become_error_responses() {
        let connector = InMemoryConnector::new();
        connector.add_bean("app:type=A", [("X", RawValue::Integer(1))]);
        let mut handler = handler(&connector);

        let (response, flow) = handler
            .handle(Request::QueryMBeanNames {
                pattern: "*:*".to_string(),
                timeout_ms: None,
            })
            .await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            response,
            Response::Error(RpcError::Connection {
                message: "failed to get connection to JMX server: configuration not provided"
                    .to_string()
            })
        );

        let (response, _) = handler.handle(Request::GetInternalStats).await;
        assert!(matches!(response, Response::Error(RpcError::Jmx { .. })));
    }

    #[tokio::test]
    async fn test_disconnect_stops_even_without_session() {
        let mut handler = handler(&InMemoryConnector::new());
        let (response, flow) = handler.handle(Request::Disconnect).await;
        assert_eq!(flow, Flow::Stop);
        assert_eq!(
            response,
            Response::Error(RpcError::Connection {
                message: "cannot disconnect, connection to JMX endpoint is not established"
                    .to_string()
            })
        );
    }
}
