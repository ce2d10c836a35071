//! Client metrics.
//!
//! # Metrics
//! - `admin_client_requests_total` (counter): attempts by method, status
//! - `admin_client_request_duration_seconds` (histogram): per attempt
//! - `admin_client_retries_total` (counter): 5xx retries by method, status
//! - `admin_client_token_refresh_total` (counter): refresh cycles by outcome
//! - `admin_client_token_refresh_duration_seconds` (histogram)

use std::time::{Duration, Instant};

/// Record one HTTP attempt. `status` is 0 when no response arrived.
pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "admin_client_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!(
        "admin_client_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a scheduled retry after a server error.
pub fn record_retry(method: &str, status: u16) {
    ::metrics::counter!(
        "admin_client_retries_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a settled refresh cycle.
pub fn record_refresh(success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!("admin_client_token_refresh_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("admin_client_token_refresh_duration_seconds")
        .record(elapsed.as_secs_f64());
}
