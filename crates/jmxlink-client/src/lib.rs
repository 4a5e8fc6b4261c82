//! # jmxlink client
//!
//! Caller side of the jmxlink bridge. [`JmxClient`] speaks the framed RPC
//! over any duplex byte stream; [`BridgeProcess`] spawns the `jmxlink`
//! binary and binds a client to its stdin/stdout.
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), jmxlink_client::ClientError> {
//! use jmxlink_client::BridgeProcess;
//! use jmxlink_protocol::JmxConfig;
//!
//! let mut bridge = BridgeProcess::spawn_default().await?;
//! bridge.client().connect(JmxConfig::new("localhost", 9999)).await?;
//! for entry in bridge.client().query_mbean("java.lang:type=Threading").await?.valid_attributes() {
//!     println!("{}", entry);
//! }
//! bridge.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod process;
pub mod query;

pub use client::JmxClient;
pub use error::{ClientError, ClientResult};
pub use process::{BRIDGE_EXEC_ENV, BridgeIo, BridgeProcess};
pub use query::{QueryAttrResponse, QueryResponse};
