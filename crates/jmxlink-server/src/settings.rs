//! Process-level settings of the bridge binary.
//!
//! Per-session settings arrive with the `connect` request; these only cover
//! how the bridge itself reaches endpoints and logs.

use clap::Parser;
use jmxlink_core::JolokiaConfig;
use jmxlink_core::connector::jolokia::DEFAULT_HTTP_TIMEOUT;
use std::time::Duration;
use url::Url;

use crate::logging::LoggingConfig;

/// Command-line settings.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jmxlink",
    version,
    about = "JMX query bridge speaking length-prefixed MessagePack on stdin/stdout"
)]
pub struct Settings {
    /// Jolokia agent used as a proxy for `service:jmx:` targets
    #[arg(long, env = "JMXLINK_AGENT_URL", value_name = "URL")]
    pub agent_url: Option<Url>,

    /// HTTP timeout for agent calls, in milliseconds
    #[arg(
        long,
        env = "JMXLINK_AGENT_TIMEOUT_MS",
        value_name = "MS",
        default_value_t = DEFAULT_HTTP_TIMEOUT.as_millis() as u64
    )]
    pub agent_timeout_ms: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "JMXLINK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log JSON lines to stderr
    #[arg(long, env = "JMXLINK_LOG_JSON")]
    pub log_json: bool,
}

impl Settings {
    /// Connector settings.
    pub fn jolokia(&self) -> JolokiaConfig {
        JolokiaConfig {
            agent_url: self.agent_url.clone(),
            http_timeout: Duration::from_millis(self.agent_timeout_ms),
        }
    }

    /// Logging settings.
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            structured: self.log_json,
        }
    }
}
