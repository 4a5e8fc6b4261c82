//! Framed stdio transport.
//!
//! Reads one length-prefixed request frame at a time, answers it with exactly
//! one response frame and repeats until the input closes, a `disconnect` is
//! answered, or shutdown is requested.

use futures::{SinkExt, StreamExt};
use bytes::Bytes;
use jmxlink_protocol::{
    MAX_FRAME_SIZE, MsgPackCodec, RequestFrame, Response, ResponseFrame, RpcError, length_delimited,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ServerResult;
use crate::handler::{Flow, JmxServiceHandler};

/// Trait for byte sources the server reads frames from.
pub trait FrameReader: AsyncRead + Unpin + Send {}
impl<T: AsyncRead + Unpin + Send> FrameReader for T {}

/// Trait for byte sinks the server writes frames to.
pub trait FrameWriter: AsyncWrite + Unpin + Send {}
impl<T: AsyncWrite + Unpin + Send> FrameWriter for T {}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The peer closed its end
    EndOfInput,
    /// A `disconnect` request was answered
    Disconnected,
    /// The shutdown token fired
    Shutdown,
}

/// Sequential request/response server over a framed byte stream.
#[derive(Debug)]
pub struct StdioServer {
    handler: JmxServiceHandler,
    codec: MsgPackCodec,
    shutdown: CancellationToken,
}

impl StdioServer {
    /// Create a server around `handler`.
    pub fn new(handler: JmxServiceHandler) -> Self {
        Self {
            handler,
            codec: MsgPackCodec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an externally owned shutdown token.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token that stops the loop between requests when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The request handler.
    pub fn handler(&self) -> &JmxServiceHandler {
        &self.handler
    }

    /// Serve frames from `reader`, writing responses to `writer`.
    ///
    /// # Errors
    ///
    /// Fails only on transport errors: unreadable frames (including frames
    /// above the size limit), write failures, or a response that cannot be
    /// encoded. Failing requests are answered and do not end the loop.
    pub async fn run<R, W>(&mut self, reader: R, writer: W) -> ServerResult<StopReason>
    where
        R: FrameReader,
        W: FrameWriter,
    {
        let mut frames = FramedRead::new(reader, length_delimited());
        let mut sink = FramedWrite::new(writer, length_delimited());

        info!("serving requests");
        let reason = loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break StopReason::Shutdown,
                next = frames.next() => next,
            };

            let payload = match next {
                Some(Ok(payload)) => payload,
                Some(Err(e)) => {
                    error!(error = %e, "failed to read request frame");
                    return Err(e.into());
                }
                None => break StopReason::EndOfInput,
            };

            let (reply, flow) = match self.codec.decode::<RequestFrame>(&payload) {
                Ok(frame) => {
                    debug!(id = frame.id, method = frame.request.method(), "request");
                    let (response, flow) = self.handler.handle(frame.request).await;
                    (
                        ResponseFrame {
                            id: frame.id,
                            response,
                        },
                        flow,
                    )
                }
                Err(e) => {
                    warn!(error = %e, len = payload.len(), "undecodable request frame");
                    (
                        ResponseFrame {
                            id: 0,
                            response: Response::Error(RpcError::InvalidRequest {
                                message: e.to_string(),
                            }),
                        },
                        Flow::Continue,
                    )
                }
            };

            let bytes = self.encode_reply(&reply)?;
            if let Err(e) = sink.send(bytes).await {
                error!(error = %e, "failed to write response frame");
                return Err(e.into());
            }

            if flow == Flow::Stop {
                break StopReason::Disconnected;
            }
        };

        info!(?reason, "request loop stopped");
        Ok(reason)
    }
}

impl StdioServer {
    /// Encodes `reply`, swapping it for an error reply with the same id when
    /// the payload would not fit in one frame.
    fn encode_reply(&self, reply: &ResponseFrame) -> ServerResult<Bytes> {
        let bytes = self.codec.encode_frame(reply)?;
        if bytes.len() <= MAX_FRAME_SIZE {
            return Ok(bytes);
        }
        warn!(id = reply.id, len = bytes.len(), "response too large for one frame");
        let replacement = ResponseFrame {
            id: reply.id,
            response: Response::Error(RpcError::Jmx {
                message: format!(
                    "response exceeds maximum frame size: {} > {MAX_FRAME_SIZE} bytes",
                    bytes.len()
                ),
                cause_message: String::new(),
                stacktrace: String::new(),
            }),
        };
        Ok(self.codec.encode_frame(&replacement)?)
    }
}

/// Serve on the process's stdin and stdout.
///
/// # Errors
///
/// See [`StdioServer::run`].
pub async fn serve_stdio(server: &mut StdioServer) -> ServerResult<StopReason> {
    server.run(tokio::io::stdin(), tokio::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmxlink_core::JmxFetcher;
    use jmxlink_core::testing::InMemoryConnector;
    use jmxlink_core::RawValue;
    use jmxlink_protocol::{JmxConfig, Request};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::io::duplex;

    fn server() -> StdioServer {
        let fetcher = JmxFetcher::new(Arc::new(InMemoryConnector::new()));
        StdioServer::new(JmxServiceHandler::new(fetcher))
    }

    #[tokio::test]
    async fn test_garbage_payload_answered_with_id_zero() {
        let (client, server_io) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, client_write) = tokio::io::split(client);

        let mut srv = server();
        let task = tokio::spawn(async move { srv.run(server_read, server_write).await });

        let codec = MsgPackCodec::new();
        let mut out = FramedWrite::new(client_write, length_delimited());
        let mut input = FramedRead::new(client_read, length_delimited());

        out.send(Bytes::from_static(&[0xc1, 0x00, 0x13])).await.unwrap();
        let reply: ResponseFrame = codec.decode(&input.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply.id, 0);
        assert!(matches!(
            reply.response,
            Response::Error(RpcError::InvalidRequest { .. })
        ));

        let ping = codec
            .encode_frame(&RequestFrame {
                id: 5,
                request: Request::Ping,
            })
            .unwrap();
        out.send(ping).await.unwrap();
        let reply: ResponseFrame = codec.decode(&input.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(
            reply,
            ResponseFrame {
                id: 5,
                response: Response::Pong
            }
        );

        SinkExt::<Bytes>::close(&mut out).await.unwrap();
        assert_eq!(task.await.unwrap().unwrap(), StopReason::EndOfInput);
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_idle_loop() {
        let (_client, server_io) = duplex(64);
        let (server_read, server_write) = tokio::io::split(server_io);

        let mut srv = server();
        let token = srv.shutdown_token();
        let task = tokio::spawn(async move { srv.run(server_read, server_write).await });

        token.cancel();
        assert_eq!(task.await.unwrap().unwrap(), StopReason::Shutdown);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_fatal() {
        let (client, server_io) = duplex(64);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (_client_read, mut client_write) = tokio::io::split(client);

        let mut srv = server();
        let task = tokio::spawn(async move { srv.run(server_read, server_write).await });

        use tokio::io::AsyncWriteExt;
        client_write.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        client_write.flush().await.unwrap();

        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_oversized_reply_becomes_error() {
        let connector = InMemoryConnector::new();
        connector.add_bean(
            "big:type=Blob",
            [("Data", RawValue::Str("x".repeat(MAX_FRAME_SIZE + 1024 * 1024)))],
        );
        let fetcher = JmxFetcher::new(Arc::new(connector));
        let mut srv = StdioServer::new(JmxServiceHandler::new(fetcher));

        let (client, server_io) = duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, client_write) = tokio::io::split(client);
        let task = tokio::spawn(async move { srv.run(server_read, server_write).await });

        let codec = MsgPackCodec::new();
        let mut out = FramedWrite::new(client_write, length_delimited());
        let mut input = FramedRead::new(client_read, length_delimited());
        let mut call = async |id: u64, request: Request| {
            out.send(codec.encode_frame(&RequestFrame { id, request }).unwrap())
                .await
                .unwrap();
            let reply: ResponseFrame = codec.decode(&input.next().await.unwrap().unwrap()).unwrap();
            reply
        };

        let config = JmxConfig {
            request_timeout_ms: 30_000,
            ..JmxConfig::new("localhost", 9999)
        };
        let reply = call(1, Request::Connect { config, timeout_ms: None }).await;
        assert_eq!(reply.response.kind(), "connected");

        let reply = call(
            2,
            Request::GetMBeanAttribute {
                mbean_name: "big:type=Blob".into(),
                attribute: "Data".into(),
                timeout_ms: None,
            },
        )
        .await;
        assert_eq!(reply.id, 2);
        match reply.response {
            Response::Error(RpcError::Jmx { message, .. }) => {
                assert!(message.contains("exceeds maximum frame size"), "{message}")
            }
            other => panic!("expected a jmx error, got {other:?}"),
        }

        let reply = call(3, Request::Ping).await;
        assert_eq!(
            reply,
            ResponseFrame {
                id: 3,
                response: Response::Pong
            }
        );

        drop(call);
        SinkExt::<Bytes>::close(&mut out).await.unwrap();
        assert_eq!(task.await.unwrap().unwrap(), StopReason::EndOfInput);
    }
}
