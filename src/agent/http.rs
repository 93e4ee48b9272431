//! Shared HTTP client and status mapping for model APIs.

use std::sync::OnceLock;
use std::time::Duration;

use crate::error::RelayError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> RelayError {
    match status {
        401 | 403 => RelayError::Authentication(body.to_string()),
        429 => RelayError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => RelayError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Gemini reports `error.details[].retryDelay` as e.g. "17s".
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let error = value.get("error")?;
    if let Some(seconds) = error.get("retry_after").and_then(|r| r.as_f64()) {
        return Some((seconds * 1000.0) as u64);
    }
    error
        .get("details")?
        .as_array()?
        .iter()
        .filter_map(|detail| detail.get("retryDelay")?.as_str())
        .find_map(|delay| delay.strip_suffix('s')?.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as u64)
}
