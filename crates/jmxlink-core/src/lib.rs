//! # jmxlink core
//!
//! Everything between the RPC surface and a management endpoint:
//!
//! - [`connector`]: the seam to the endpoint, with a Jolokia implementation
//! - [`connection`]: target URL construction and session lifecycle
//! - [`executor`]: bounded-time execution on a dedicated worker
//! - [`session`] and [`fetcher`]: the query operations
//! - [`normalize`]: flattening raw values into typed entries
//! - [`stats`]: per-call timing records
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use jmxlink_core::{JmxFetcher, JolokiaConfig, JolokiaConnector};
//! use jmxlink_protocol::JmxConfig;
//! use std::sync::Arc;
//!
//! let connector = JolokiaConnector::new(JolokiaConfig {
//!     agent_url: Some("http://localhost:8778/jolokia".parse()?),
//!     ..JolokiaConfig::default()
//! });
//! let fetcher = JmxFetcher::new(Arc::new(connector));
//!
//! fetcher.connect(JmxConfig::new("localhost", 9999), 5_000).await?;
//! for name in fetcher.query_mbean_names("java.lang:type=*", 5_000).await? {
//!     println!("{name}");
//! }
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

pub mod connection;
pub mod connector;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod normalize;
pub mod object_name;
pub mod session;
pub mod stats;
pub mod value;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use connection::{ConnectionManager, DEFAULT_URI_PATH, build_connection_env, build_connection_string};
pub use connector::{
    ConnectionEnv, Connector, ConnectorError, ConnectorResult, JolokiaConfig, JolokiaConnector,
    MBeanServerConnection,
};
pub use error::{FetchError, FetchResult};
pub use executor::TimeoutExecutor;
pub use fetcher::{JmxFetcher, VERSION};
pub use normalize::parse_value;
pub use object_name::{ObjectName, ObjectNameError};
pub use session::JmxSession;
pub use stats::{InternalStats, SharedStats, StatHandle};
pub use value::RawValue;
