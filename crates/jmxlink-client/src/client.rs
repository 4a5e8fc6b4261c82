//! Framed RPC client.

use futures::{SinkExt, StreamExt};
use jmxlink_protocol::{
    AttributeResponse, InternalStat, JmxConfig, MsgPackCodec, Request, RequestFrame, Response,
    ResponseFrame, length_delimited,
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Client for a jmxlink bridge reachable over `T`.
///
/// Calls are strictly sequential: one request frame, then exactly one
/// response frame carrying the same id. A transport failure, a missed
/// response deadline or an id mismatch leaves the stream out of step, so
/// every later call fails with [`ClientError::Closed`].
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), jmxlink_client::ClientError> {
/// use jmxlink_client::JmxClient;
/// use jmxlink_protocol::JmxConfig;
///
/// let (io, _bridge_side) = tokio::io::duplex(64 * 1024);
/// let mut client = JmxClient::new(io);
/// client.connect(JmxConfig::new("localhost", 9999)).await?;
/// let names = client.query_mbean_names("java.lang:type=*").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JmxClient<T> {
    framed: Framed<T, LengthDelimitedCodec>,
    codec: MsgPackCodec,
    next_id: u64,
    call_timeout_ms: Option<i64>,
    response_timeout: Option<Duration>,
    broken: bool,
}

impl<T> JmxClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a duplex byte stream connected to a bridge.
    pub fn new(io: T) -> Self {
        Self {
            framed: Framed::new(io, length_delimited()),
            codec: MsgPackCodec::new(),
            next_id: 1,
            call_timeout_ms: None,
            response_timeout: None,
            broken: false,
        }
    }

    /// Deadline sent with every operation, overriding the bridge default.
    pub fn set_call_timeout_ms(&mut self, timeout_ms: Option<i64>) {
        self.call_timeout_ms = timeout_ms;
    }

    /// How long to wait locally for each response frame.
    pub fn set_response_timeout(&mut self, timeout: Option<Duration>) {
        self.response_timeout = timeout;
    }

    /// Whether the stream is still in step with the bridge.
    pub fn is_usable(&self) -> bool {
        !self.broken
    }

    /// Round-trip without touching the JMX session.
    ///
    /// # Errors
    ///
    /// Transport errors only.
    pub async fn ping(&mut self) -> ClientResult<()> {
        match self.call(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected("ping", &other)),
        }
    }

    /// Version of the bridge.
    ///
    /// # Errors
    ///
    /// Transport errors only.
    pub async fn get_client_version(&mut self) -> ClientResult<String> {
        match self.call(Request::GetClientVersion).await? {
            Response::Version(version) => Ok(version),
            other => Err(unexpected("getClientVersion", &other)),
        }
    }

    /// Open the bridge's JMX session.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] when the endpoint cannot be reached.
    pub async fn connect(&mut self, config: JmxConfig) -> ClientResult<()> {
        let request = Request::Connect {
            config,
            timeout_ms: self.call_timeout_ms,
        };
        match self.call(request).await? {
            Response::Connected => Ok(()),
            other => Err(unexpected("connect", &other)),
        }
    }

    /// Close the JMX session; the bridge stops serving afterwards.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] when no session was open.
    pub async fn disconnect(&mut self) -> ClientResult<()> {
        let result = self.call(Request::Disconnect).await;
        // The bridge exits after answering; nothing more can be sent.
        self.broken = true;
        match result? {
            Response::Disconnected => Ok(()),
            other => Err(unexpected("disconnect", &other)),
        }
    }

    /// Names of beans matching `pattern`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Jmx`] for a malformed pattern, or a connection error.
    pub async fn query_mbean_names(&mut self, pattern: &str) -> ClientResult<Vec<String>> {
        let request = Request::QueryMBeanNames {
            pattern: pattern.to_string(),
            timeout_ms: self.call_timeout_ms,
        };
        match self.call(request).await? {
            Response::MBeanNames(names) => Ok(names),
            other => Err(unexpected("queryMBeanNames", &other)),
        }
    }

    /// Readable attribute names of one bean.
    ///
    /// # Errors
    ///
    /// [`ClientError::Jmx`] when the bean is unknown, or a connection error.
    pub async fn get_mbean_attribute_names(&mut self, mbean_name: &str) -> ClientResult<Vec<String>> {
        let request = Request::GetMBeanAttributeNames {
            mbean_name: mbean_name.to_string(),
            timeout_ms: self.call_timeout_ms,
        };
        match self.call(request).await? {
            Response::AttributeNames(names) => Ok(names),
            other => Err(unexpected("getMBeanAttributeNames", &other)),
        }
    }

    /// One attribute, flattened into entries.
    ///
    /// # Errors
    ///
    /// [`ClientError::Jmx`] when the attribute cannot be read or parsed.
    pub async fn get_mbean_attribute(
        &mut self,
        mbean_name: &str,
        attribute: &str,
    ) -> ClientResult<Vec<AttributeResponse>> {
        let request = Request::GetMBeanAttribute {
            mbean_name: mbean_name.to_string(),
            attribute: attribute.to_string(),
            timeout_ms: self.call_timeout_ms,
        };
        match self.call(request).await? {
            Response::Attributes(entries) => Ok(entries),
            other => Err(unexpected("getMBeanAttribute", &other)),
        }
    }

    /// Several attributes of one bean; per-attribute failures come back as
    /// error entries.
    ///
    /// # Errors
    ///
    /// Connection errors, or a malformed bean name.
    pub async fn get_mbean_attributes(
        &mut self,
        mbean_name: &str,
        attributes: Vec<String>,
    ) -> ClientResult<Vec<AttributeResponse>> {
        let request = Request::GetMBeanAttributes {
            mbean_name: mbean_name.to_string(),
            attributes,
            timeout_ms: self.call_timeout_ms,
        };
        match self.call(request).await? {
            Response::Attributes(entries) => Ok(entries),
            other => Err(unexpected("getMBeanAttributes", &other)),
        }
    }

    /// Attributes of every bean matching `pattern`; empty `attributes`
    /// means all readable ones.
    ///
    /// # Errors
    ///
    /// Connection errors, or a malformed pattern.
    pub async fn query_mbean_attributes(
        &mut self,
        pattern: &str,
        attributes: Vec<String>,
    ) -> ClientResult<Vec<AttributeResponse>> {
        let request = Request::QueryMBeanAttributes {
            pattern: pattern.to_string(),
            attributes,
            timeout_ms: self.call_timeout_ms,
        };
        match self.call(request).await? {
            Response::Attributes(entries) => Ok(entries),
            other => Err(unexpected("queryMBeanAttributes", &other)),
        }
    }

    /// Drain the bridge's internal stats.
    ///
    /// # Errors
    ///
    /// [`ClientError::Jmx`] when stats were not enabled on connect.
    pub async fn get_internal_stats(&mut self) -> ClientResult<Vec<InternalStat>> {
        match self.call(Request::GetInternalStats).await? {
            Response::InternalStats(stats) => Ok(stats),
            other => Err(unexpected("getInternalStats", &other)),
        }
    }

    /// Send one request and wait for its response.
    ///
    /// Error responses are returned as the matching [`ClientError`].
    ///
    /// # Errors
    ///
    /// Transport, codec and correlation failures, plus error responses.
    pub async fn call(&mut self, request: Request) -> ClientResult<Response> {
        if self.broken {
            return Err(ClientError::Closed);
        }

        let id = self.next_id;
        self.next_id += 1;
        let method = request.method();
        debug!(id, method, "sending request");

        let response_timeout = self.response_timeout;
        let result = match response_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.exchange(id, request))
                .await
                .unwrap_or(Err(ClientError::Timeout(timeout))),
            None => self.exchange(id, request).await,
        };

        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                warn!(id, method, error = %e, "bridge exchange failed");
                self.broken = true;
                return Err(e);
            }
        };

        if frame.id != id {
            self.broken = true;
            return Err(ClientError::IdMismatch {
                expected: id,
                actual: frame.id,
            });
        }

        match frame.response {
            Response::Error(err) => Err(err.into()),
            response => Ok(response),
        }
    }

    async fn exchange(&mut self, id: u64, request: Request) -> ClientResult<ResponseFrame> {
        let bytes = self.codec.encode_frame(&RequestFrame { id, request })?;
        self.framed.send(bytes).await?;

        match self.framed.next().await {
            Some(Ok(payload)) => Ok(self.codec.decode(&payload)?),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::Closed),
        }
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> T {
        self.framed.into_inner()
    }
}

fn unexpected(method: &'static str, response: &Response) -> ClientError {
    ClientError::UnexpectedResponse {
        method,
        kind: response.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmxlink_protocol::{AttributeValue, RpcError};
    use pretty_assertions::assert_eq;
    use tokio::io::{DuplexStream, duplex};

    /// Peer answering each request with the next scripted reply.
    fn scripted_peer(
        io: DuplexStream,
        replies: Vec<(Option<u64>, Response)>,
    ) -> tokio::task::JoinHandle<Vec<RequestFrame>> {
        tokio::spawn(async move {
            let codec = MsgPackCodec::new();
            let mut framed = Framed::new(io, length_delimited());
            let mut seen = Vec::new();
            for (id_override, response) in replies {
                let Some(Ok(payload)) = framed.next().await else {
                    break;
                };
                let request: RequestFrame = codec.decode(&payload).unwrap();
                let id = id_override.unwrap_or(request.id);
                seen.push(request);
                let frame = codec.encode_frame(&ResponseFrame { id, response }).unwrap();
                framed.send(frame).await.unwrap();
            }
            seen
        })
    }

    #[tokio::test]
    async fn test_ids_increase_and_timeouts_are_sent() {
        let (client_io, peer_io) = duplex(8192);
        let peer = scripted_peer(
            peer_io,
            vec![
                (None, Response::Pong),
                (None, Response::MBeanNames(vec!["a:b=c".to_string()])),
            ],
        );

        let mut client = JmxClient::new(client_io);
        client.set_call_timeout_ms(Some(750));
        client.ping().await.unwrap();
        assert_eq!(client.query_mbean_names("a:*").await.unwrap(), vec!["a:b=c"]);

        let seen = peer.await.unwrap();
        assert_eq!(seen[0].id, 1);
        assert_eq!(seen[1].id, 2);
        assert_eq!(
            seen[1].request,
            Request::QueryMBeanNames {
                pattern: "a:*".to_string(),
                timeout_ms: Some(750),
            }
        );
    }

    #[tokio::test]
    async fn test_error_response_maps_to_client_error() {
        let (client_io, peer_io) = duplex(8192);
        let _peer = scripted_peer(
            peer_io,
            vec![
                (
                    None,
                    Response::Error(RpcError::Jmx {
                        message: "can't find mBean: a:b=c".to_string(),
                        cause_message: String::new(),
                        stacktrace: String::new(),
                    }),
                ),
                (
                    None,
                    Response::Attributes(vec![AttributeResponse::new(
                        "a:b=d,attr=X",
                        AttributeValue::Int(3),
                    )]),
                ),
            ],
        );

        let mut client = JmxClient::new(client_io);
        let err = client.get_mbean_attribute_names("a:b=c").await.unwrap_err();
        assert!(err.is_jmx());
        assert!(client.is_usable());

        let entries = client.get_mbean_attribute("a:b=d", "X").await.unwrap();
        assert_eq!(entries[0].as_i64(), Some(3));
    }

    #[tokio::test]
    async fn test_id_mismatch_breaks_client() {
        let (client_io, peer_io) = duplex(8192);
        let _peer = scripted_peer(peer_io, vec![(Some(42), Response::Pong)]);

        let mut client = JmxClient::new(client_io);
        let err = client.ping().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::IdMismatch {
                expected: 1,
                actual: 42
            }
        ));
        assert!(matches!(client.ping().await, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn test_unexpected_kind() {
        let (client_io, peer_io) = duplex(8192);
        let _peer = scripted_peer(peer_io, vec![(None, Response::Connected)]);

        let mut client = JmxClient::new(client_io);
        let err = client.get_client_version().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedResponse {
                method: "getClientVersion",
                kind: "connected"
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_timeout() {
        let (client_io, _silent_peer) = duplex(8192);
        let mut client = JmxClient::new(client_io);
        client.set_response_timeout(Some(Duration::from_millis(200)));

        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(200)));
        assert!(!client.is_usable());
    }

    #[tokio::test]
    async fn test_peer_gone() {
        let (client_io, peer_io) = duplex(8192);
        drop(peer_io);
        let mut client = JmxClient::new(client_io);
        assert!(client.ping().await.unwrap_err().is_fatal());
    }
}
