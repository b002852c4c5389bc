pub mod client;
pub mod error;
pub mod line_protocol;
pub mod model;

pub use client::SimpleTsdb;
pub use error::{SimpleTsdbError, SimpleTsdbResult};
pub use model::{
    AggregatorQuery, DeleteDownsamplerRequest, DeletePointsRequest, DownsampleQuery, Downsampler,
    InsertPointRequest, Options, Point, PointValue, QueryPointsRequest, ServerError, Tags,
};

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Applied to every request, covering connect through body read.
    pub request_timeout: Option<Duration>,
    /// Upper bound on each chunk of a streamed `/insert_points` body.
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8981,
            request_timeout: None,
            chunk_size: 8 * 1024,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `SIMPLETSDB_*` keys resolved by `get`. Numeric
    /// values that fail to parse leave the default in place.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = get("SIMPLETSDB_HOST") {
            config.host = host;
        }

        if let Some(port_str) = get("SIMPLETSDB_PORT") {
            config.port = port_str.parse().unwrap_or(config.port);
        }

        if let Some(timeout_str) = get("SIMPLETSDB_TIMEOUT_MS") {
            config.request_timeout = timeout_str.parse().ok().map(Duration::from_millis);
        }

        if let Some(chunk_str) = get("SIMPLETSDB_CHUNK_SIZE") {
            config.chunk_size = chunk_str.parse().unwrap_or(config.chunk_size);
        }

        config
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> SimpleTsdbResult<()> {
        if self.host.is_empty() {
            return Err(SimpleTsdbError::Config("host must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(SimpleTsdbError::Config("chunk_size must be positive".to_string()));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(SimpleTsdbError::Config("request_timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
