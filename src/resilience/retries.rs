//! Retry decision for transient server failures.

use reqwest::{Method, StatusCode};
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Decides whether a failed attempt is retried and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_retries(&self) -> u32 {
        if self.config.enabled {
            self.config.max_retries
        } else {
            0
        }
    }

    /// Whether the method may be replayed after a 5xx.
    pub fn allows_method(&self, method: &Method) -> bool {
        method.is_idempotent() || self.config.retry_non_idempotent
    }

    /// `retries_so_far` counts retries already performed, not attempts.
    pub fn should_retry(&self, method: &Method, status: StatusCode, retries_so_far: u32) -> bool {
        status.is_server_error()
            && retries_so_far < self.max_retries()
            && self.allows_method(method)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.config.base_delay_ms, self.config.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
