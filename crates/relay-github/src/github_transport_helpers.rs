//! Retry and error-shaping helpers for GitHub REST calls.

use std::time::Duration;

use reqwest::header::HeaderMap;

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Server-requested wait: `Retry-After` seconds, or the primary rate-limit
/// reset when the quota is exhausted.
pub fn parse_retry_after(headers: &HeaderMap, now_unix_secs: u64) -> Option<Duration> {
    if let Some(seconds) = header_u64(headers, "retry-after") {
        return Some(Duration::from_secs(seconds));
    }
    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        let reset = header_u64(headers, "x-ratelimit-reset")?;
        return Some(Duration::from_secs(reset.saturating_sub(now_unix_secs)));
    }
    None
}

pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    let cap = Duration::from_millis(MAX_RETRY_DELAY_MS);
    if let Some(delay) = retry_after {
        return delay.max(Duration::from_millis(base_delay_ms)).min(cap);
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled).min(cap)
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// 429s, 5xx, and 403s that GitHub marks as rate limited.
pub fn is_retryable_github_response(status: u16, headers: &HeaderMap) -> bool {
    match status {
        429 => true,
        403 => {
            headers.contains_key("retry-after")
                || header_u64(headers, "x-ratelimit-remaining") == Some(0)
        }
        status => status >= 500,
    }
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_none() {
        return head;
    }
    format!("{head}...")
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok()
}
