//! Shared HTTP plumbing for the two upstream clients.
//!
//! Both upstreams are single-shot JSON POSTs with a per-call timeout. This
//! module builds the pooled `reqwest` clients and classifies transport
//! failures so the agent and desktop clients report them the same way.

use std::time::Duration;

use reqwest::Client as HttpClient;

/// TCP connection timeout, independent of the per-call total timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum upstream body bytes kept in errors and log records.
pub(crate) const UPSTREAM_BODY_LIMIT: usize = 512;

/// How a request failed before an HTTP status was available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportFailure {
    Timeout,
    Unavailable(String),
}

impl TransportFailure {
    /// Classify a `reqwest` send/read error.
    ///
    /// Timeouts are checked first: a connect that exceeds the deadline reports
    /// both `is_connect()` and `is_timeout()`.
    pub(crate) fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportFailure::Timeout
        } else {
            TransportFailure::Unavailable(err.to_string())
        }
    }
}

/// Build a pooled HTTP client with the given total per-call timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<HttpClient, reqwest::Error> {
    HttpClient::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
}

/// Truncate a string to at most `max_bytes` bytes on a valid UTF-8 char boundary.
pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Clamp an upstream body for inclusion in an error.
pub(crate) fn clip_body(body: &str) -> String {
    truncate_utf8(body, UPSTREAM_BODY_LIMIT).to_string()
}

/// Milliseconds in a `Duration`, saturating.
pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
