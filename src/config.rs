//! Client configuration
//!
//! Every option is explicit; the core never reads the process
//! environment. Defaults match the documented client contract.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_results() -> usize {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_cache_max_entries() -> usize {
    1_000
}

fn default_cache_ttl_ms() -> u64 {
    300_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

/// Configuration for [`RdfqlClient`](crate::client::RdfqlClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The JSON-LD context document (bare mapping or `@context`-wrapped).
    pub context: JsonValue,
    /// SPARQL query endpoint URL.
    pub query_endpoint_url: String,
    /// SPARQL update endpoint URL; the query endpoint serves updates
    /// when unset.
    #[serde(default)]
    pub update_endpoint_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Run the coarse SPARQL validator over outgoing read queries.
    #[serde(default = "default_true")]
    pub validate_query: bool,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Total endpoint attempts for transient failures.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Log compiled SPARQL at debug level.
    #[serde(default)]
    pub debug: bool,
}

impl ClientConfig {
    /// A configuration with the default option set.
    pub fn new(context: JsonValue, query_endpoint_url: impl Into<String>) -> Self {
        Self {
            context,
            query_endpoint_url: query_endpoint_url.into(),
            update_endpoint_url: None,
            timeout_ms: default_timeout_ms(),
            max_results: default_max_results(),
            validate_query: true,
            cache_enabled: true,
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_ms: default_cache_ttl_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            debug: false,
        }
    }

    pub fn with_update_endpoint(mut self, url: impl Into<String>) -> Self {
        self.update_endpoint_url = Some(url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_validate_query(mut self, validate_query: bool) -> Self {
        self.validate_query = validate_query;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_cache_limits(mut self, max_entries: usize, ttl_ms: u64) -> Self {
        self.cache_max_entries = max_entries;
        self.cache_ttl_ms = ttl_ms;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}
