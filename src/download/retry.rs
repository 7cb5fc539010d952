//! Failure classification and retry budgeting for upstream transfers.
//!
//! This module provides the [`ErrorClassifier`] and [`RetryPolicy`] types that
//! decide what happens after a transfer attempt fails.
//!
//! # Overview
//!
//! A failure message is classified into a [`FailureClass`]:
//! - [`FailureClass::Blocked`] - upstream throttling or availability policy
//!   (rate limits, sign-in challenges, private or restricted media)
//! - [`FailureClass::Transient`] - anything not otherwise recognized
//! - [`FailureClass::Fatal`] - failures no retry can fix (bad URL, missing tool)
//!
//! The [`RetryPolicy`] then keeps an in-memory attempt count per
//! `(resource key, failure class)` pair and computes exponential backoff
//! delays with jitter. Counts live for the lifetime of the policy only, so a
//! candidate that ran out of retries may be attempted again on the next run.
//!
//! # Example
//!
//! ```
//! use audiobook_core::config::RetryConfig;
//! use audiobook_core::download::{ErrorClassifier, FailureClass, RetryPolicy};
//!
//! let config = RetryConfig::default();
//! let classifier = ErrorClassifier::new(&config);
//! let mut policy = RetryPolicy::new(&config);
//!
//! let class = classifier.classify("ERROR: HTTP Error 429: Too Many Requests");
//! assert_eq!(class, FailureClass::Blocked);
//! assert!(policy.should_retry("https://youtu.be/abc", class));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::TransferError;
use crate::config::RetryConfig;

/// Default maximum retries per `(resource key, failure class)` pair.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Classification of a failed transfer or search attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Upstream refused or throttled the request.
    ///
    /// Examples: HTTP 403/429, "Sign in to confirm", private video.
    Blocked,

    /// Temporary failure of unknown cause that may succeed on retry.
    Transient,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: unsupported URL, HTTP 404, transfer tool not installed,
    /// result shorter than the minimum duration.
    Fatal,
}

impl FailureClass {
    /// Returns true for classes worth spending retry budget on.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Blocked => "blocked",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Classifies failure messages by case-insensitive substring markers.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    blocking_indicators: Vec<String>,
    fatal_indicators: Vec<String>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

impl ErrorClassifier {
    /// Builds a classifier from the configured indicator lists.
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            blocking_indicators: lowercase_all(&config.blocking_indicators),
            fatal_indicators: lowercase_all(&config.fatal_indicators),
        }
    }

    /// Classifies a raw failure message.
    ///
    /// Blocking markers are checked first, then fatal markers; anything else
    /// is [`FailureClass::Transient`].
    #[must_use]
    pub fn classify(&self, message: &str) -> FailureClass {
        let message = message.to_lowercase();
        if self
            .blocking_indicators
            .iter()
            .any(|marker| message.contains(marker.as_str()))
        {
            FailureClass::Blocked
        } else if self
            .fatal_indicators
            .iter()
            .any(|marker| message.contains(marker.as_str()))
        {
            FailureClass::Fatal
        } else {
            FailureClass::Transient
        }
    }

    /// Classifies a structured transfer error.
    ///
    /// | Error | Class |
    /// |-------|-------|
    /// | `Unavailable` | Fatal (tool missing) |
    /// | `TooShort` | Fatal (not the full work) |
    /// | `Io` | Fatal (local filesystem problem) |
    /// | `Failed` | by message markers |
    #[must_use]
    pub fn classify_transfer_error(&self, error: &TransferError) -> FailureClass {
        match error {
            TransferError::Unavailable { .. }
            | TransferError::TooShort { .. }
            | TransferError::Io { .. } => FailureClass::Fatal,
            TransferError::Failed { message, .. } => self.classify(message),
        }
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Per-run retry budget and backoff calculator.
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * 2^attempt_index + jitter, max_delay)
/// ```
///
/// With defaults (base 2s, jitter up to 1s, cap 30s) delays are roughly
/// 2s, 4s, 8s, 16s, then 30s from the fifth retry on.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
    attempts: HashMap<(String, FailureClass), u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Creates a policy from configuration with an empty attempt map.
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            max_jitter: config.max_jitter(),
            attempts: HashMap::new(),
        }
    }

    /// Creates a policy with a custom retry budget and default delays.
    ///
    /// `with_max_retries(0)` never retries anything.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Returns the configured retry budget.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns how many retries were granted so far for the pair.
    #[must_use]
    pub fn attempts(&self, resource_key: &str, class: FailureClass) -> u32 {
        self.attempts
            .get(&(resource_key.to_string(), class))
            .copied()
            .unwrap_or(0)
    }

    /// Decides whether the pair may be retried, consuming one unit of budget
    /// when it may.
    ///
    /// Returns `true` exactly `max_retries` times for a fixed pair, then
    /// `false` for the rest of the policy's lifetime.
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&mut self, resource_key: &str, class: FailureClass) -> bool {
        let count = self
            .attempts
            .entry((resource_key.to_string(), class))
            .or_insert(0);

        if *count >= self.max_retries {
            debug!(attempts = *count, "retry budget exhausted");
            return false;
        }

        *count += 1;
        debug!(attempt = *count, "retry granted");
        true
    }

    /// Computes the wait before retry number `attempt_index` (0-based).
    ///
    /// Non-decreasing in expectation as `attempt_index` grows, and never
    /// above the configured ceiling.
    #[must_use]
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let delay = self.exponential_delay(attempt_index) + self.jitter();
        let delay = delay.min(self.max_delay);
        debug!(attempt_index, delay_ms = delay.as_millis(), "backoff delay");
        delay
    }

    /// `base * 2^attempt_index`, saturating, capped at `max_delay`.
    fn exponential_delay(&self, attempt_index: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = 2u64.checked_pow(attempt_index).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor)).min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=max_ms);
        Duration::from_millis(jitter_ms)
    }
}
