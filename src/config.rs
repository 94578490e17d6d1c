//! Client configuration: API credentials, paging defaults and retry policy.

use crate::{FmError, Result};
use std::time::Duration;

/// Default Last.fm web services endpoint.
pub const DEFAULT_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Largest page size Last.fm accepts for paged methods.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Error codes Last.fm documents as transient:
/// 8 (operation failed, try again), 11 (service offline),
/// 16 (temporarily unavailable).
pub const RETRYABLE_ERROR_CODES: [u32; 3] = [8, 11, 16];

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (0 disables retries)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Last.fm error codes that are retried
    pub retryable_codes: Vec<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            retryable_codes: RETRYABLE_ERROR_CODES.to_vec(),
        }
    }
}

impl RetryConfig {
    /// Create a config with retries disabled
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Default retry budget without any pause between attempts
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Create a config with custom retry count
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set custom retry delays
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Replace the set of retryable error codes
    pub fn with_retryable_codes(mut self, codes: Vec<u32>) -> Self {
        self.retryable_codes = codes;
        self
    }

    pub fn is_retryable(&self, error_code: u32) -> bool {
        self.retryable_codes.contains(&error_code)
    }

    /// Backoff before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Everything a [`LastFmClient`](crate::LastFmClient) needs to talk to Last.fm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Last.fm API key, assumed valid for the process lifetime
    pub api_key: String,
    /// User whose data is queried when a call does not name one
    pub username: String,
    /// Web services endpoint
    pub base_url: String,
    /// Items requested per page (clamped to 1..=200)
    pub page_size: u32,
    /// Retry policy for transient error codes
    pub retry: RetryConfig,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            username: username.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig::default(),
        }
    }

    /// Build a config from `FMKEY`, `FM_USERNAME` and the optional `FM_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("FMKEY")
            .map_err(|_| FmError::InvalidArgument("FMKEY environment variable not set".into()))?;
        let username = std::env::var("FM_USERNAME").map_err(|_| {
            FmError::InvalidArgument("FM_USERNAME environment variable not set".into())
        })?;

        let mut config = Self::new(api_key, username);
        if let Ok(base_url) = std::env::var("FM_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = clamp_page_size(page_size);
        self
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set custom retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }
}

pub(crate) fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}
