//! Tracker configuration
//!
//! Settings can be built in code, read from `PROCFLOW_*` environment
//! variables or parsed from a TOML document. Keys missing from the
//! environment or the document keep their defaults.

use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_INGEST_ENDPOINT;
use crate::delivery::DeliveryConfig;
use crate::error::Result;
use crate::resolver::ParentStrategy;

/// Name given to flows created implicitly by `start`
pub const DEFAULT_FLOW_NAME: &str = "flow";

/// Configuration for a [`Tracker`](crate::Tracker)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tracking is off until explicitly enabled
    pub enabled: bool,

    /// Swallow internal errors instead of returning them
    pub suppress_errors: bool,

    /// Log internal errors and delivery retries
    pub log_errors: bool,

    /// Retries per queue item after the first attempt
    pub max_retries: u32,

    /// Base retry delay in milliseconds, doubled on each retry
    pub retry_delay_ms: u64,

    /// Ingestion endpoint URL
    pub ingest_endpoint: String,

    /// How parents are inferred when `start` gets none
    pub parent_strategy: ParentStrategy,

    /// Name of implicitly created flows
    pub default_flow_name: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            suppress_errors: true,
            log_errors: true,
            max_retries: 3,
            retry_delay_ms: 500,
            ingest_endpoint: DEFAULT_INGEST_ENDPOINT.to_string(),
            parent_strategy: ParentStrategy::default(),
            default_flow_name: DEFAULT_FLOW_NAME.to_string(),
        }
    }
}

impl TrackerConfig {
    /// Create a new config builder
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::new()
    }

    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - PROCFLOW_ENABLED
    /// - PROCFLOW_SUPPRESS_ERRORS
    /// - PROCFLOW_LOG_ERRORS
    /// - PROCFLOW_MAX_RETRIES
    /// - PROCFLOW_RETRY_DELAY_MS
    /// - PROCFLOW_INGEST_ENDPOINT
    /// - PROCFLOW_PARENT_STRATEGY (`stack_trace` or `context`)
    /// - PROCFLOW_FLOW_NAME
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: lookup("PROCFLOW_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.enabled),
            suppress_errors: lookup("PROCFLOW_SUPPRESS_ERRORS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.suppress_errors),
            log_errors: lookup("PROCFLOW_LOG_ERRORS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.log_errors),
            max_retries: parse_or("PROCFLOW_MAX_RETRIES", lookup("PROCFLOW_MAX_RETRIES"), defaults.max_retries),
            retry_delay_ms: parse_or(
                "PROCFLOW_RETRY_DELAY_MS",
                lookup("PROCFLOW_RETRY_DELAY_MS"),
                defaults.retry_delay_ms,
            ),
            ingest_endpoint: lookup("PROCFLOW_INGEST_ENDPOINT").unwrap_or(defaults.ingest_endpoint),
            parent_strategy: parse_or(
                "PROCFLOW_PARENT_STRATEGY",
                lookup("PROCFLOW_PARENT_STRATEGY"),
                defaults.parent_strategy,
            ),
            default_flow_name: lookup("PROCFLOW_FLOW_NAME").unwrap_or(defaults.default_flow_name),
        }
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Settings handed to the delivery queue
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            endpoint: self.ingest_endpoint.clone(),
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            log_errors: self.log_errors,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable configuration value");
            default
        }),
        None => default,
    }
}

/// Builder for TrackerConfig
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn suppress_errors(mut self, suppress: bool) -> Self {
        self.config.suppress_errors = suppress;
        self
    }

    pub fn log_errors(mut self, log: bool) -> Self {
        self.config.log_errors = log;
        self
    }

    /// Set the retries per queue item
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the base retry delay in milliseconds
    pub fn retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.retry_delay_ms = delay_ms;
        self
    }

    /// Set the ingestion endpoint
    pub fn ingest_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.ingest_endpoint = endpoint.into();
        self
    }

    pub fn parent_strategy(mut self, strategy: ParentStrategy) -> Self {
        self.config.parent_strategy = strategy;
        self
    }

    pub fn default_flow_name(mut self, name: impl Into<String>) -> Self {
        self.config.default_flow_name = name.into();
        self
    }

    /// Build the config
    pub fn build(self) -> TrackerConfig {
        self.config
    }
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
