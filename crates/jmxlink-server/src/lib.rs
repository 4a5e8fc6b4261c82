//! # jmxlink server
//!
//! Sequential request/response server exposing [`jmxlink_core::JmxFetcher`]
//! over length-prefixed MessagePack frames, plus the pieces of the `jmxlink`
//! bridge binary (settings, logging).
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), jmxlink_server::ServerError> {
//! use jmxlink_core::{JmxFetcher, JolokiaConnector};
//! use jmxlink_server::{JmxServiceHandler, StdioServer, serve_stdio};
//! use std::sync::Arc;
//!
//! let fetcher = JmxFetcher::new(Arc::new(JolokiaConnector::default()));
//! let mut server = StdioServer::new(JmxServiceHandler::new(fetcher));
//! serve_stdio(&mut server).await?;
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

pub mod error;
pub mod handler;
pub mod logging;
pub mod settings;
pub mod transport;

pub use error::{ServerError, ServerResult};
pub use handler::{Flow, JmxServiceHandler};
pub use logging::LoggingConfig;
pub use settings::Settings;
pub use transport::{FrameReader, FrameWriter, StdioServer, StopReason, serve_stdio};
