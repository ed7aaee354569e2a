//! Toolkit configuration with sensible defaults.
//!
//! [`ToolkitConfig`] captures cache, HTTP and retry settings and converts
//! them into ready-to-use parts via [`build_cache`](ToolkitConfig::build_cache),
//! [`build_transport`](ToolkitConfig::build_transport) and
//! [`build_executor`](ToolkitConfig::build_executor).
//!
//! # Environment
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `TOOLKIT_CACHE_TTL_SECS` | success TTL | `300` |
//! | `TOOLKIT_CACHE_MAX_ENTRIES` | capacity bound | unbounded |
//! | `TOOLKIT_NEGATIVE_CACHE_TTL_SECS` | provider-failure TTL, `0` disables | disabled |
//! | `TOOLKIT_SWEEP_INTERVAL_SECS` | background sweep, `0` disables | disabled |
//! | `TOOLKIT_HTTP_TIMEOUT_SECS` | per-call timeout | `30` |
//! | `TOOLKIT_MAX_RETRIES` | caller-side retries | `0` |

use crate::api::retry::RetryConfig;
use crate::api::transport::{DEFAULT_HTTP_TIMEOUT, DEFAULT_USER_AGENT, ReqwestTransport, Transport};
use crate::cache::{DEFAULT_TTL, ResultCache, SweeperHandle, spawn_sweeper};
use crate::result::ToolError;
use crate::tools::executor::ToolExecutor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_CACHE_TTL: &str = "TOOLKIT_CACHE_TTL_SECS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "TOOLKIT_CACHE_MAX_ENTRIES";
pub const ENV_NEGATIVE_CACHE_TTL: &str = "TOOLKIT_NEGATIVE_CACHE_TTL_SECS";
pub const ENV_SWEEP_INTERVAL: &str = "TOOLKIT_SWEEP_INTERVAL_SECS";
pub const ENV_HTTP_TIMEOUT: &str = "TOOLKIT_HTTP_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "TOOLKIT_MAX_RETRIES";

/// Configuration for a toolkit process.
#[derive(Debug, Clone)]
pub struct ToolkitConfig {
    /// TTL for successful results. Default: 300s.
    pub cache_ttl: Duration,
    /// Maximum live cache entries. Default: unbounded.
    pub max_entries: Option<usize>,
    /// TTL for provider failures. Default: `None` (not cached).
    pub negative_cache_ttl: Option<Duration>,
    /// Interval of the background expiry sweep. Default: `None` (lazy
    /// expiry only).
    pub sweep_interval: Option<Duration>,
    /// Timeout applied to every outbound call. Default: 30s.
    pub http_timeout: Duration,
    /// `User-Agent` sent by the HTTP transport.
    pub user_agent: String,
    /// Caller-side retry policy. Default: no retries.
    pub retry: RetryConfig,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            max_entries: None,
            negative_cache_ttl: None,
            sweep_interval: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl ToolkitConfig {
    /// Defaults overridden by `TOOLKIT_*` environment variables.
    pub fn from_env() -> Result<Self, ToolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(ENV_CACHE_TTL) {
            config.cache_ttl = positive_secs(ENV_CACHE_TTL, &raw)?;
        }
        if let Some(raw) = get(ENV_CACHE_MAX_ENTRIES) {
            let max: usize = parse(ENV_CACHE_MAX_ENTRIES, &raw)?;
            if max == 0 {
                return Err(ToolError::invalid_config(
                    ENV_CACHE_MAX_ENTRIES,
                    "must be at least 1",
                ));
            }
            config.max_entries = Some(max);
        }
        if let Some(raw) = get(ENV_NEGATIVE_CACHE_TTL) {
            config.negative_cache_ttl = optional_secs(ENV_NEGATIVE_CACHE_TTL, &raw)?;
        }
        if let Some(raw) = get(ENV_SWEEP_INTERVAL) {
            config.sweep_interval = optional_secs(ENV_SWEEP_INTERVAL, &raw)?;
        }
        if let Some(raw) = get(ENV_HTTP_TIMEOUT) {
            config.http_timeout = positive_secs(ENV_HTTP_TIMEOUT, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_RETRIES) {
            config.retry.max_retries = parse(ENV_MAX_RETRIES, &raw)?;
        }
        Ok(config)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn with_negative_cache_ttl(mut self, ttl: Duration) -> Self {
        self.negative_cache_ttl = Some(ttl);
        self
    }

    /// A zero interval disables the sweep, as in the environment.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// A cache with this config's TTL and capacity.
    pub fn build_cache(&self) -> ResultCache {
        let cache = ResultCache::new().with_default_ttl(self.cache_ttl);
        match self.max_entries {
            Some(max) => cache.with_max_entries(max),
            None => cache,
        }
    }

    /// An HTTP transport sending this config's user agent.
    pub fn build_transport(&self) -> Result<ReqwestTransport, ToolError> {
        ReqwestTransport::with_user_agent(&self.user_agent)
    }

    /// An executor over `transport` with a fresh cache built from this
    /// config. Credentials come from the environment.
    pub fn build_executor(&self, transport: Arc<dyn Transport>) -> ToolExecutor {
        ToolExecutor::new(transport)
            .with_cache(Arc::new(self.build_cache()))
            .with_default_timeout(self.http_timeout)
            .with_success_ttl(self.cache_ttl)
            .with_failure_ttl(self.negative_cache_ttl)
    }

    /// Start the background sweep over `cache`, if one is configured.
    /// Must be called inside a tokio runtime.
    pub fn spawn_sweeper(&self, cache: &Arc<ResultCache>) -> Option<SweeperHandle> {
        self.sweep_interval
            .and_then(|interval| spawn_sweeper(Arc::clone(cache), interval))
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ToolError> {
    raw.trim().parse().map_err(|_| {
        ToolError::invalid_config(key, format!("expected a non-negative integer, got {raw:?}"))
    })
}

fn positive_secs(key: &str, raw: &str) -> Result<Duration, ToolError> {
    match parse::<u64>(key, raw)? {
        0 => Err(ToolError::invalid_config(key, "must be at least 1 second")),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn optional_secs(key: &str, raw: &str) -> Result<Option<Duration>, ToolError> {
    let secs: u64 = parse(key, raw)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ToolErrorKind;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ToolkitConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(config.max_entries.is_none());
        assert!(config.negative_cache_ttl.is_none());
        assert!(config.sweep_interval.is_none());
        assert_eq!(config.retry.max_retries, 0);
        assert!(config.user_agent.starts_with("spoon-toolkit/"));
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ToolkitConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.cache_ttl, DEFAULT_TTL);
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn reads_every_variable() {
        let config = ToolkitConfig::from_lookup(lookup(&[
            (ENV_CACHE_TTL, "60"),
            (ENV_CACHE_MAX_ENTRIES, "1000"),
            (ENV_NEGATIVE_CACHE_TTL, "15"),
            (ENV_SWEEP_INTERVAL, " 120 "),
            (ENV_HTTP_TIMEOUT, "100"),
            (ENV_MAX_RETRIES, "3"),
        ]))
        .unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.max_entries, Some(1000));
        assert_eq!(config.negative_cache_ttl, Some(Duration::from_secs(15)));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(120)));
        assert_eq!(config.http_timeout, Duration::from_secs(100));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn zero_disables_optional_durations() {
        let config = ToolkitConfig::from_lookup(lookup(&[
            (ENV_NEGATIVE_CACHE_TTL, "0"),
            (ENV_SWEEP_INTERVAL, "0"),
        ]))
        .unwrap();
        assert!(config.negative_cache_ttl.is_none());
        assert!(config.sweep_interval.is_none());
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = ToolkitConfig::from_lookup(lookup(&[(ENV_CACHE_TTL, "  ")])).unwrap();
        assert_eq!(config.cache_ttl, DEFAULT_TTL);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        for (key, raw) in [
            (ENV_CACHE_TTL, "five"),
            (ENV_CACHE_TTL, "0"),
            (ENV_CACHE_MAX_ENTRIES, "0"),
            (ENV_HTTP_TIMEOUT, "-1"),
            (ENV_MAX_RETRIES, "1.5"),
        ] {
            let err = ToolkitConfig::from_lookup(lookup(&[(key, raw)])).unwrap_err();
            assert_eq!(err.kind(), ToolErrorKind::Configuration, "{key}={raw}");
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn build_cache_applies_ttl_and_capacity() {
        let cache = ToolkitConfig::default()
            .with_cache_ttl(Duration::from_secs(42))
            .with_max_entries(2)
            .build_cache();
        assert_eq!(cache.default_ttl(), Duration::from_secs(42));
        for i in 0..5 {
            cache.put("op", &serde_json::json!({"i": i}), crate::result::ToolResult::success(i));
        }
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn sweeper_only_when_configured() {
        let cache = Arc::new(ResultCache::new());
        assert!(ToolkitConfig::default().spawn_sweeper(&cache).is_none());
        let handle = ToolkitConfig::default()
            .with_sweep_interval(Duration::from_secs(60))
            .spawn_sweeper(&cache);
        assert!(handle.is_some_and(|h| h.is_running()));
    }

    #[tokio::test]
    async fn zero_sweep_interval_disables_sweeper() {
        let config = ToolkitConfig::default().with_sweep_interval(Duration::ZERO);
        assert!(config.sweep_interval.is_none());
        let cache = Arc::new(ResultCache::new());
        assert!(config.spawn_sweeper(&cache).is_none());
    }
}
