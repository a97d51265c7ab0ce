//! Configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifying header sent with every outbound request.
pub const DEFAULT_USER_AGENT: &str =
    "KB-MCP-Server/2.2.0 (Model Context Protocol; Swedish National Library APIs)";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Transport settings.
    pub http: HttpSettings,
    /// Backoff settings.
    pub retry: RetrySettings,
    /// Response cache settings.
    pub cache: CacheSettings,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Overall per-attempt deadline in seconds.
    pub timeout_secs: f64,
    /// Connection-establishment deadline in seconds.
    pub connect_timeout_secs: f64,
    /// User-Agent header value.
    pub user_agent: String,
    /// Idle keep-alive connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// Seconds an idle pooled connection is kept.
    pub pool_idle_timeout_secs: f64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30.0,
            connect_timeout_secs: 10.0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pool_max_idle_per_host: 10,
            pool_idle_timeout_secs: 30.0,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        secs(self.pool_idle_timeout_secs)
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in seconds.
    pub base_delay_secs: f64,
    /// Upper bound for any single delay, in seconds.
    pub max_delay_secs: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30.0,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        secs(self.base_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        secs(self.max_delay_secs)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Consult and populate the cache at all.
    pub enabled: bool,
    /// Entry freshness window in seconds.
    pub ttl_secs: u64,
    /// Entry count that triggers eviction.
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            max_size: 1000,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// Negative or NaN values clamp to zero, values too large clamp to the maximum.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
