use std::time::Duration;

use crate::error::{Result, TracepipeError};

/// Default collector endpoint.
pub const DEFAULT_BASE_URL: &str = "https://collector.tracepipe.dev";

const DEFAULT_BATCH_SIZE: usize = 100;
pub(crate) const DEFAULT_BATCH_MAX_BYTES: usize = 3 * 1024 * 1024;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;
const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_QUEUE_MAX_SIZE: usize = 10_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CLOSE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_BASE_DELAY_MS: u64 = 200;
const DEFAULT_MAX_DELAY_SECS: u64 = 10;
const DEFAULT_RATE_LIMIT_MAX_TOKENS: f64 = 10.0;
const DEFAULT_QUEUE_DROP_LOGGING_PERIOD_SECS: u64 = 60;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn default_api_key() -> String {
    std::env::var("TRACEPIPE_API_KEY").unwrap_or_default()
}

fn default_project_id() -> String {
    std::env::var("TRACEPIPE_PROJECT_ID").unwrap_or_default()
}

fn default_base_url() -> String {
    std::env::var("TRACEPIPE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn default_batch_size() -> usize {
    env_parse("TRACEPIPE_BATCH_SIZE").unwrap_or(DEFAULT_BATCH_SIZE)
}

fn default_flush_interval() -> Duration {
    Duration::from_millis(
        env_parse("TRACEPIPE_FLUSH_INTERVAL_MS").unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
    )
}

fn default_max_retries() -> usize {
    env_parse("TRACEPIPE_NUM_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES)
}

fn default_queue_max_size() -> usize {
    env_parse("TRACEPIPE_QUEUE_MAX_SIZE").unwrap_or(DEFAULT_QUEUE_MAX_SIZE)
}

fn default_debug() -> bool {
    matches!(
        std::env::var("TRACEPIPE_DEBUG").ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// Client configuration.
///
/// Tunables default from `TRACEPIPE_*` environment variables; `api_key` and
/// `project_id` are required and validated at client construction. Use the
/// builder to override individual fields:
///
/// ```
/// use tracepipe::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .api_key("sk-test")
///     .project_id("proj-42")
///     .batch_size(50)
///     .max_retries(5)
///     .build();
/// ```
#[derive(bon::Builder, Debug, Clone)]
pub struct ClientConfig {
    /// API key for the collector (TRACEPIPE_API_KEY). Required.
    #[builder(default = default_api_key(), into)]
    api_key: String,

    /// Project identifier attached to every event (TRACEPIPE_PROJECT_ID). Required.
    #[builder(default = default_project_id(), into)]
    project_id: String,

    /// Collector base URL (TRACEPIPE_BASE_URL).
    #[builder(default = default_base_url(), into)]
    base_url: String,

    /// Events per batch, and the queue-length flush threshold
    /// (TRACEPIPE_BATCH_SIZE, default: 100).
    #[builder(default = default_batch_size())]
    batch_size: usize,

    /// Max serialized bytes per batch (default: 3MB).
    #[builder(default = DEFAULT_BATCH_MAX_BYTES)]
    batch_max_bytes: usize,

    /// Timer period between background flushes
    /// (TRACEPIPE_FLUSH_INTERVAL_MS, default: 5000).
    #[builder(default = default_flush_interval())]
    flush_interval: Duration,

    /// Retries per batch after the first attempt
    /// (TRACEPIPE_NUM_RETRIES, default: 3 retries = 4 total attempts).
    #[builder(default = default_max_retries())]
    max_retries: usize,

    /// First backoff delay; doubles per attempt (default: 200ms).
    #[builder(default = Duration::from_millis(DEFAULT_BASE_DELAY_MS))]
    base_delay: Duration,

    /// Backoff ceiling (default: 10s).
    #[builder(default = Duration::from_secs(DEFAULT_MAX_DELAY_SECS))]
    max_delay: Duration,

    /// Per-request HTTP timeout (default: 10s).
    #[builder(default = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))]
    request_timeout: Duration,

    /// Bound on the final flush performed by `close()` (default: 5s).
    #[builder(default = Duration::from_secs(DEFAULT_CLOSE_TIMEOUT_SECS))]
    close_timeout: Duration,

    /// Pending-queue capacity; events past it are dropped
    /// (TRACEPIPE_QUEUE_MAX_SIZE, default: 10000).
    #[builder(default = default_queue_max_size())]
    max_queue_size: usize,

    /// Drop-warning throttle period (default: 60s).
    #[builder(default = Duration::from_secs(DEFAULT_QUEUE_DROP_LOGGING_PERIOD_SECS))]
    queue_drop_logging_period: Duration,

    /// Token-bucket capacity for outbound delivery cycles (default: 10).
    #[builder(default = DEFAULT_RATE_LIMIT_MAX_TOKENS)]
    rate_limit_max_tokens: f64,

    /// Token-bucket refill period (default: 1s).
    #[builder(default = Duration::from_secs(1))]
    rate_limit_refill_period: Duration,

    /// Log every accept, drop, retry, and exhaustion (TRACEPIPE_DEBUG).
    #[builder(default = default_debug())]
    debug: bool,
}

impl ClientConfig {
    /// Reject configurations that are missing required fields.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TracepipeError::Config("api_key is required".to_string()));
        }
        if self.project_id.trim().is_empty() {
            return Err(TracepipeError::Config("project_id is required".to_string()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| TracepipeError::Config(format!("invalid base_url: {e}")))?;
        Ok(())
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn batch_max_bytes(&self) -> usize {
        self.batch_max_bytes
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    pub fn queue_drop_logging_period(&self) -> Duration {
        self.queue_drop_logging_period
    }

    pub fn rate_limit_max_tokens(&self) -> f64 {
        self.rate_limit_max_tokens
    }

    pub fn rate_limit_refill_period(&self) -> Duration {
        self.rate_limit_refill_period
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}
