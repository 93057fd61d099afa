use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Chainable, ErrorKind, Result};
use crate::value::{Format, Json, Toml};

/// The production origin used by `canonical` when no domain is given.
pub const DEFAULT_BASE_URL: &str = "https://baohiembaovietdanang.vn";

/// The flat option set shared by the template engine and the analytics
/// dispatcher.
///
/// Every field has a default, so an empty document is a valid configuration.
/// Field names are camelCase when deserialized:
///
/// ```rust
/// use gazette::config::Options;
///
/// let options = Options::from_toml("maxCacheEntries = 5\nbatchSize = 2").unwrap();
/// assert_eq!(options.max_cache_entries, 5);
/// assert_eq!(options.batch_size, 2);
/// assert_eq!(options.max_buffer_size, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Maximum number of templates kept in the template cache.
    pub max_cache_entries: usize,
    /// Maximum number of analytics events held before the oldest are dropped.
    pub max_buffer_size: usize,
    /// Buffer length that triggers an immediate flush.
    pub batch_size: usize,
    /// Delay after the last tracked event before the buffer is flushed.
    pub flush_debounce_ms: u64,
    /// Number of times a failed batch is re-queued before it is dropped.
    pub max_retries: u32,
    /// Retry `n` waits `n * retry_base_delay_ms`.
    pub retry_base_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub idle_timeout_ms: u64,
    /// Domain used by the `canonical` helper.
    pub base_url: String,
    /// Locale used by date helpers.
    pub locale: Locale,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Vietnamese: `16 tháng 10, 2026`.
    #[default]
    Vi,
    /// US English: `October 16, 2026`.
    En,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_cache_entries: 50,
            max_buffer_size: 100,
            batch_size: 10,
            flush_debounce_ms: 10_000,
            max_retries: 3,
            retry_base_delay_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            idle_timeout_ms: 5 * 60 * 1_000,
            base_url: DEFAULT_BASE_URL.into(),
            locale: Locale::Vi,
        }
    }
}

impl Options {
    pub fn from_toml(string: &str) -> Result<Self> {
        Toml::from_str(string)
            .chain(crate::error!("invalid TOML options"))
            .map_err(|e| e.with_kind(ErrorKind::Config))
    }

    pub fn from_json(string: &str) -> Result<Self> {
        Json::from_str(string)
            .chain(crate::error!("invalid JSON options"))
            .map_err(|e| e.with_kind(ErrorKind::Config))
    }

    /// Reads options from a `.json` file, or from TOML for any other
    /// extension.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let result = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Json::read(path),
            _ => Toml::read(path),
        };

        result.map_err(|e| e.with_kind(ErrorKind::Config))
    }

    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush_debounce_ms)
    }

    /// The delay before retry number `attempt` (starting at 1).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(attempt as u64))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}
