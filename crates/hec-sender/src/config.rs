// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! Client configuration.
//!
//! A [`Config`] is immutable once handed to the client. Construction is a
//! struct literal over [`Config::default`], or [`Config::from_env`] for the
//! common deployment path; both feed [`Config::validate`].

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::SenderError;

/// Sourcetype sentinel selecting the JSON-structured wire variant: custom
/// event keys are routed to the indexed `fields` side-channel instead of the
/// event body.
pub const JSON_SOURCETYPE: &str = "_json";

/// Source sentinel used when no source is configured.
pub(crate) const DEFAULT_SOURCE: &str = "unknown";

const DEFAULT_SOURCETYPE: &str = "generic_single_line";
const DEFAULT_INDEX: &str = "main";
const DEFAULT_PORT: u16 = 8088;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_COUNT: usize = 5;
const DEFAULT_RETRY_BACKOFF: f64 = 2.0;

/// Pluggable payload encoder applied to each resolved event body before
/// serialization. Receives the body value, returns the value to serialize.
pub type FormatHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Web protocol used to reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Where the acknowledgement channel identifier travels on each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLocation {
    /// `X-Splunk-Request-Channel` header (default).
    Header,
    /// `?channel=<guid>` query parameter.
    Url,
}

/// Immutable client configuration.
///
/// `channel` doubles as the acknowledgement switch: `Some` enables ack
/// tracking and attaches the channel to event and ack requests.
#[derive(Clone)]
pub struct Config {
    /// Collector host, without scheme or port.
    pub endpoint: String,
    pub port: u16,
    pub protocol: Protocol,
    /// HEC authentication token, sent as `Authorization: Splunk <token>`.
    pub token: String,
    /// Channel GUID; required for acknowledgement tracking.
    pub channel: Option<String>,
    pub channel_location: ChannelLocation,
    /// Optional protocol API version, appended to the event collector path
    /// only (the ack path is unversioned).
    pub api_version: Option<String>,
    /// Default index for records without an accepted override.
    pub index: String,
    /// Default source; `None` falls back to the `"unknown"` sentinel.
    pub source: Option<String>,
    pub sourcetype: String,
    /// Default host; `None` resolves the system hostname at construction.
    pub hostname: Option<String>,
    /// Whether reserved keys found in mapping events override the defaults.
    pub allow_overrides: bool,
    pub verify_tls: bool,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Total delivery attempt budget, including the first attempt.
    pub retry_count: usize,
    /// Backoff factor `B`; attempt `n` waits `B * 2^(n-1)` before retrying.
    pub retry_backoff: f64,
    /// Buffer capacity in records; 0 sends every event immediately.
    pub max_buf_size: usize,
    /// Gzip the event payload body.
    pub use_compression: bool,
    /// Optional HTTPS proxy URL.
    pub proxy_https: Option<String>,
    /// Log request payload previews (headers stay redacted either way).
    pub enable_debug: bool,
    /// Payload encoder hook, applied after override resolution.
    pub format_hook: Option<FormatHook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            port: DEFAULT_PORT,
            protocol: Protocol::Https,
            token: String::new(),
            channel: None,
            channel_location: ChannelLocation::Header,
            api_version: None,
            index: DEFAULT_INDEX.to_string(),
            source: None,
            sourcetype: DEFAULT_SOURCETYPE.to_string(),
            hostname: None,
            allow_overrides: false,
            verify_tls: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_buf_size: 0,
            use_compression: false,
            proxy_https: None,
            enable_debug: false,
            format_hook: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("endpoint", &self.endpoint)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("channel_location", &self.channel_location)
            .field("api_version", &self.api_version)
            .field("index", &self.index)
            .field("source", &self.source)
            .field("sourcetype", &self.sourcetype)
            .field("hostname", &self.hostname)
            .field("allow_overrides", &self.allow_overrides)
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .field("retry_backoff", &self.retry_backoff)
            .field("max_buf_size", &self.max_buf_size)
            .field("use_compression", &self.use_compression)
            .field("proxy_https", &self.proxy_https)
            .field("enable_debug", &self.enable_debug)
            .field("format_hook", &self.format_hook.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl Config {
    /// Create configuration from environment variables.
    ///
    /// `HEC_ENDPOINT` and `HEC_TOKEN` are required; everything else falls
    /// back to the defaults. Unparseable optional values are ignored with a
    /// warning rather than failing construction.
    pub fn from_env() -> Result<Self, SenderError> {
        let endpoint = env::var("HEC_ENDPOINT")
            .map_err(|_| SenderError::InvalidConfig("HEC_ENDPOINT is not set".to_string()))?;
        let token = env::var("HEC_TOKEN")
            .map_err(|_| SenderError::InvalidConfig("HEC_TOKEN is not set".to_string()))?;

        let mut config = Config {
            endpoint,
            token,
            ..Default::default()
        };

        if let Some(port) = parse_env("HEC_PORT") {
            config.port = port;
        }
        if let Ok(protocol) = env::var("HEC_PROTOCOL") {
            match protocol.to_lowercase().as_str() {
                "http" => config.protocol = Protocol::Http,
                "https" => config.protocol = Protocol::Https,
                other => warn!("unknown HEC_PROTOCOL {other:?}, keeping https"),
            }
        }
        config.channel = env::var("HEC_CHANNEL").ok().filter(|v| !v.is_empty());
        config.api_version = env::var("HEC_API_VERSION").ok().filter(|v| !v.is_empty());
        if let Ok(index) = env::var("HEC_INDEX") {
            config.index = index;
        }
        config.source = env::var("HEC_SOURCE").ok().filter(|v| !v.is_empty());
        if let Ok(sourcetype) = env::var("HEC_SOURCETYPE") {
            config.sourcetype = sourcetype;
        }
        config.hostname = env::var("HEC_HOSTNAME").ok().filter(|v| !v.is_empty());
        config.allow_overrides = env_flag("HEC_ALLOW_OVERRIDES");
        if env::var("HEC_VERIFY_TLS").is_ok() {
            config.verify_tls = env_flag("HEC_VERIFY_TLS");
        }
        if let Some(secs) = parse_env::<u64>("HEC_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(count) = parse_env("HEC_RETRY_COUNT") {
            config.retry_count = count;
        }
        if let Some(backoff) = parse_env("HEC_RETRY_BACKOFF") {
            config.retry_backoff = backoff;
        }
        if let Some(size) = parse_env("HEC_MAX_BUF_SIZE") {
            config.max_buf_size = size;
        }
        config.use_compression = env_flag("HEC_COMPRESSION");
        config.proxy_https = env::var("HEC_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok()
            .filter(|v| !v.is_empty());
        config.enable_debug = env_flag("HEC_DEBUG");

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SenderError> {
        if self.endpoint.is_empty() {
            return Err(SenderError::InvalidConfig(
                "endpoint must not be empty".to_string(),
            ));
        }
        if self.token.is_empty() {
            return Err(SenderError::InvalidConfig(
                "token must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(SenderError::InvalidConfig(
                "port must be non-zero".to_string(),
            ));
        }
        if self.retry_count == 0 {
            return Err(SenderError::InvalidConfig(
                "retry count must be at least 1".to_string(),
            ));
        }
        if !self.retry_backoff.is_finite() || self.retry_backoff < 0.0 {
            return Err(SenderError::InvalidConfig(format!(
                "retry backoff must be a non-negative number, got {}",
                self.retry_backoff
            )));
        }
        if self.timeout.is_zero() {
            return Err(SenderError::InvalidConfig(
                "timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective default source, applying the `"unknown"` sentinel.
    pub(crate) fn default_source(&self) -> &str {
        self.source.as_deref().unwrap_or(DEFAULT_SOURCE)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparseable {name}: {raw:?}");
            None
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
