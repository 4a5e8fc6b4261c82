//! Frame codec: length prefix from `tokio-util`, MessagePack payloads from `rmp-serde`.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::codec::LengthDelimitedCodec;

/// Largest accepted frame payload (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Payload could not be serialized
    #[error("codec error: encode: {0}")]
    Encode(String),

    /// Payload could not be deserialized
    #[error("codec error: decode: {0}")]
    Decode(String),

    /// Length prefix or underlying stream failure
    #[error("codec error: frame: {0}")]
    Frame(#[from] std::io::Error),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Length-delimited framing: `u32` big-endian prefix, payload capped at [`MAX_FRAME_SIZE`].
pub fn length_delimited() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_type::<u32>()
        .big_endian()
        .max_frame_length(MAX_FRAME_SIZE)
        .new_codec()
}

/// MessagePack payload codec.
///
/// Structs are written as maps with field names so optional fields can be
/// omitted and added without breaking older peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Create a new MessagePack codec
    pub fn new() -> Self {
        Self
    }

    /// Encode a value to bytes
    pub fn encode<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Encode a value into a frame payload ready for a length-delimited sink
    pub fn encode_frame<T: Serialize>(&self, value: &T) -> CodecResult<Bytes> {
        self.encode(value).map(Bytes::from)
    }

    /// Decode bytes to a value
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Content type of the payloads
    pub fn content_type(&self) -> &'static str {
        "application/msgpack"
    }
}
