// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::HookError;
use crate::severity::Severity;
use std::env;
use std::time::Duration;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest queue capacity the underlying channel can hold.
pub const MAX_QUEUE_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;
/// Upper bound for every configured duration (one year).
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Configuration for a logs hook. Fixed once the hook is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfig {
    /// Collector URL every batch is POSTed to
    pub endpoint_url: String,
    /// Host identifier written into every message
    pub host: String,
    /// Tags written into every message, in order
    pub tags: Vec<String>,
    /// Minimum severity the hook handles
    pub level: Severity,
    /// Time between flush ticks
    pub flush_interval: Duration,
    /// Slots in the ingest queue
    pub queue_capacity: usize,
    /// Timeout for a single delivery request
    pub request_timeout: Duration,
    /// Flush early once a batch holds this many messages
    pub max_batch_size: Option<usize>,
    /// How long `close` waits for the final flush and in-flight deliveries
    pub shutdown_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            host: String::new(),
            tags: Vec::new(),
            level: Severity::Info,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_batch_size: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            https_proxy: None,
        }
    }
}

impl HookConfig {
    /// Creates a configuration with the required settings and defaults for
    /// everything else.
    pub fn new<I, T>(
        endpoint_url: impl Into<String>,
        host: impl Into<String>,
        level: Severity,
        tags: I,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            endpoint_url: endpoint_url.into(),
            host: host.into(),
            tags: tags.into_iter().map(Into::into).collect(),
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    #[must_use]
    pub fn with_https_proxy(mut self, https_proxy: impl Into<String>) -> Self {
        self.https_proxy = Some(https_proxy.into());
        self
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, HookError> {
        let endpoint_url = env::var("LOGS_HOOK_ENDPOINT").unwrap_or_default();
        let host = env::var("LOGS_HOOK_HOST")
            .or_else(|_| env::var("HOSTNAME"))
            .unwrap_or_default();
        let level = match env::var("LOGS_HOOK_LEVEL") {
            Ok(val) => val
                .parse::<Severity>()
                .map_err(|e| HookError::InvalidConfig(e.to_string()))?,
            Err(_) => Severity::Info,
        };
        let tags = env::var("LOGS_HOOK_TAGS")
            .map(|val| parse_tags(&val))
            .unwrap_or_default();
        let flush_interval =
            env_secs("LOGS_HOOK_FLUSH_INTERVAL").unwrap_or(DEFAULT_FLUSH_INTERVAL);
        let queue_capacity =
            env_parse::<usize>("LOGS_HOOK_QUEUE_CAPACITY").unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let request_timeout = env_secs("LOGS_HOOK_TIMEOUT").unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let max_batch_size = env_parse::<usize>("LOGS_HOOK_MAX_BATCH_SIZE");
        let shutdown_timeout =
            env_secs("LOGS_HOOK_SHUTDOWN_TIMEOUT").unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let https_proxy = env::var("LOGS_HOOK_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();

        let config = Self {
            endpoint_url,
            host,
            tags,
            level,
            flush_interval,
            queue_capacity,
            request_timeout,
            max_batch_size,
            shutdown_timeout,
            https_proxy,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), HookError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(HookError::InvalidConfig(
                "endpoint URL cannot be empty".to_string(),
            ));
        }

        let url = reqwest::Url::parse(&self.endpoint_url).map_err(|e| {
            HookError::InvalidConfig(format!(
                "invalid endpoint URL '{}': {e}",
                self.endpoint_url
            ))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(HookError::InvalidConfig(format!(
                "endpoint URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.queue_capacity == 0 {
            return Err(HookError::InvalidConfig(
                "queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(HookError::InvalidConfig(format!(
                "queue capacity must be at most {MAX_QUEUE_CAPACITY}"
            )));
        }

        if self.flush_interval.is_zero() {
            return Err(HookError::InvalidConfig(
                "flush interval must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(HookError::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("flush interval", self.flush_interval),
            ("request timeout", self.request_timeout),
            ("shutdown timeout", self.shutdown_timeout),
        ] {
            if value > MAX_DURATION {
                return Err(HookError::InvalidConfig(format!(
                    "{name} must be at most {} seconds",
                    MAX_DURATION.as_secs()
                )));
            }
        }

        if self.max_batch_size == Some(0) {
            return Err(HookError::InvalidConfig(
                "max batch size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_tags(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}
