//! # jmxlink protocol
//!
//! Wire data model shared by the `jmxlink` bridge process and its callers,
//! plus the frame codec used on the stdio channel.
//!
//! ## Framing
//!
//! Every request and every response travels as one frame: a 4-byte big-endian
//! length prefix followed by a MessagePack payload with named fields. Calls
//! strictly alternate, one request frame answered by exactly one response
//! frame, so there is no multiplexing state on the wire beyond the echoed
//! request id.
//!
//! ```rust
//! use jmxlink_protocol::{MsgPackCodec, Request, RequestFrame};
//!
//! let codec = MsgPackCodec::new();
//! let frame = RequestFrame { id: 7, request: Request::Ping };
//!
//! let bytes = codec.encode(&frame).unwrap();
//! let decoded: RequestFrame = codec.decode(&bytes).unwrap();
//! assert_eq!(decoded, frame);
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod codec;
mod config;
mod rpc;
mod types;

pub use codec::{CodecError, CodecResult, MAX_FRAME_SIZE, MsgPackCodec, length_delimited};
pub use config::JmxConfig;
pub use rpc::{Request, RequestFrame, Response, ResponseFrame, RpcError};
pub use types::{AttributeResponse, AttributeValue, InternalStat, ResponseType};
