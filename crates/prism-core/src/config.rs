//! Prism configuration.
//!
//! Provides [`PrismConfig`], the settings consumed by the object-store client
//! and the synchronization engine. Values are loaded from environment
//! variables with documented defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{PrismError, PrismResult};

/// Default interval between catalog modification checks.
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
/// Default longest edge of a re-encoded preview, in pixels.
const DEFAULT_PREVIEW_LONGEST_DIMENSION: u32 = 220;
/// Default JPEG quality of a re-encoded preview.
const DEFAULT_PREVIEW_QUALITY: u8 = 40;

/// Prism configuration.
///
/// # Examples
///
/// ```
/// use prism_core::PrismConfig;
///
/// let config = PrismConfig::default();
/// assert_eq!(config.poll_interval_ms, 5_000);
/// assert_eq!(config.preview_longest_dimension, 220);
/// assert_eq!(config.preview_quality(), 40);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PrismConfig {
    /// Interval between checks of the watched catalog file, in milliseconds.
    #[builder(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Longest edge of re-encoded previews, in pixels.
    #[builder(default = DEFAULT_PREVIEW_LONGEST_DIMENSION)]
    pub preview_longest_dimension: u32,

    /// Requested re-encode quality. Use [`PrismConfig::preview_quality`] to
    /// read the clamped value.
    #[builder(default = DEFAULT_PREVIEW_QUALITY)]
    pub preview_quality: u8,

    /// Directory holding the durable change cache.
    #[builder(default = PathBuf::from("."))]
    pub cache_dir: PathBuf,

    /// Path of the destination profiles file.
    #[builder(default = PathBuf::from("awsprofiles.json"))]
    pub profiles_path: PathBuf,

    /// Path-style endpoint override (e.g. `http://127.0.0.1:9000`).
    ///
    /// When unset, requests go to `https://{bucket}.s3.amazonaws.com`.
    #[builder(default, setter(strip_option))]
    pub endpoint: Option<String>,

    /// Transport connect timeout, in milliseconds.
    #[builder(default = 10_000)]
    pub connect_timeout_ms: u64,

    /// Transport read/write timeout, in milliseconds.
    #[builder(default = 60_000)]
    pub io_timeout_ms: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for PrismConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            preview_longest_dimension: DEFAULT_PREVIEW_LONGEST_DIMENSION,
            preview_quality: DEFAULT_PREVIEW_QUALITY,
            cache_dir: PathBuf::from("."),
            profiles_path: PathBuf::from("awsprofiles.json"),
            endpoint: None,
            connect_timeout_ms: 10_000,
            io_timeout_ms: 60_000,
            log_level: String::from("info"),
        }
    }
}

impl PrismConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PRISM_POLL_INTERVAL_MS` | `5000` |
    /// | `PRISM_PREVIEW_LONGEST_DIMENSION` | `220` |
    /// | `PRISM_PREVIEW_QUALITY` | `40` |
    /// | `PRISM_CACHE_DIR` | `.` |
    /// | `PRISM_PROFILES_PATH` | `awsprofiles.json` |
    /// | `PRISM_ENDPOINT` | unset |
    /// | `PRISM_CONNECT_TIMEOUT_MS` | `10000` |
    /// | `PRISM_IO_TIMEOUT_MS` | `60000` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Values that fail to parse are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(n) = parse_number(&lookup, "PRISM_POLL_INTERVAL_MS") {
            config.poll_interval_ms = n;
        }
        if let Some(n) = parse_number(&lookup, "PRISM_PREVIEW_LONGEST_DIMENSION") {
            config.preview_longest_dimension = n;
        }
        if let Some(n) = parse_number::<u32>(&lookup, "PRISM_PREVIEW_QUALITY") {
            config.preview_quality = u8::try_from(n.min(100)).unwrap_or(100);
        }
        if let Some(v) = lookup("PRISM_CACHE_DIR") {
            config.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PRISM_PROFILES_PATH") {
            config.profiles_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("PRISM_ENDPOINT") {
            let trimmed = v.trim().trim_end_matches('/');
            if !trimmed.is_empty() {
                config.endpoint = Some(trimmed.to_owned());
            }
        }
        if let Some(n) = parse_number(&lookup, "PRISM_CONNECT_TIMEOUT_MS") {
            config.connect_timeout_ms = n;
        }
        if let Some(n) = parse_number(&lookup, "PRISM_IO_TIMEOUT_MS") {
            config.io_timeout_ms = n;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Reject settings the core cannot run with.
    pub fn validate(&self) -> PrismResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(PrismError::Config("poll interval must be positive".to_owned()));
        }
        if self.preview_longest_dimension == 0 {
            return Err(PrismError::Config(
                "preview longest dimension must be positive".to_owned(),
            ));
        }
        if self.connect_timeout_ms == 0 || self.io_timeout_ms == 0 {
            return Err(PrismError::Config("transport timeouts must be positive".to_owned()));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(PrismError::Config(format!(
                    "endpoint {endpoint} must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }

    /// Re-encode quality clamped to `1..=100`.
    #[must_use]
    pub fn preview_quality(&self) -> u8 {
        self.preview_quality.clamp(1, 100)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Transport connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Transport read/write timeout as a [`Duration`].
    #[must_use]
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Parse a numeric variable, logging and discarding malformed values.
fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(
                error = %PrismError::InvalidSetting { name, value: raw.clone() },
                "ignoring malformed setting"
            );
            None
        }
    }
}
