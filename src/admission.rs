//! Admission gate for inbound form submissions.
//!
//! Sits in front of validation and email dispatch: it resolves the client
//! identity, asks the limiter, and turns the answer into a plain response
//! value the request-handling layer can send back as-is.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ratelimit::{ClientKey, Clock, RateLimiter, WindowStatus};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

const RATE_LIMIT_EXCEEDED: &str = "Rate limit exceeded";

/// Identity-bearing metadata of one inbound submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMeta {
    /// Raw `X-Forwarded-For` header value
    #[serde(default)]
    pub forwarded_for: Option<String>,
    /// Direct connection address
    #[serde(default)]
    pub remote_addr: Option<String>,
    /// Raw `X-API-Key` header value
    #[serde(default)]
    pub api_key: Option<String>,
}

/// The gate's verdict, ready to be written back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl AdmissionResponse {
    /// Whether the caller should go on to validate and dispatch.
    pub fn is_admitted(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Response for a request body that could not be decoded.
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            headers: Vec::new(),
            body: json!({ "error": message }),
        }
    }

    fn rate_limited(headers: Vec<(String, String)>) -> Self {
        Self {
            status: STATUS_TOO_MANY_REQUESTS,
            headers,
            body: json!({ "error": RATE_LIMIT_EXCEEDED }),
        }
    }
}

/// Gate that rate-limits submissions before any further processing.
pub struct AdmissionGate<C: Clock> {
    limiter: Arc<RateLimiter<C>>,
}

impl<C: Clock> AdmissionGate<C> {
    pub fn new(limiter: Arc<RateLimiter<C>>) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter<C>> {
        &self.limiter
    }

    /// Decide whether a submission may proceed.
    pub fn admit(&self, meta: &SubmissionMeta) -> AdmissionResponse {
        let key = match ClientKey::resolve(
            meta.forwarded_for.as_deref(),
            meta.remote_addr.as_deref(),
            meta.api_key.as_deref(),
        ) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Rejecting submission without client identity");
                return AdmissionResponse::rate_limited(Vec::new());
            }
        };

        let bucket = key.to_string_key();
        let allowed = self.limiter.is_allowed(&bucket);
        let now = self.limiter.now();
        let status = self.limiter.status(&bucket);
        let mut headers = quota_headers(&status);

        if allowed {
            debug!(
                client = %key.address(),
                logged = self.limiter.log_len(&bucket),
                "Submission admitted"
            );
            return AdmissionResponse {
                status: STATUS_OK,
                headers,
                body: json!({ "status": "admitted" }),
            };
        }

        let retry_after = retry_after(&status, now);
        headers.push((HEADER_RETRY_AFTER.to_string(), retry_after.to_string()));
        debug!(
            client = %key.address(),
            retry_after_secs = retry_after,
            "Submission rate limited"
        );
        AdmissionResponse::rate_limited(headers)
    }
}

/// The window closest to exhaustion; ties go to the first declared.
fn binding_window(status: &[WindowStatus]) -> Option<&WindowStatus> {
    status
        .iter()
        .reduce(|best, s| if s.remaining < best.remaining { s } else { best })
}

fn quota_headers(status: &[WindowStatus]) -> Vec<(String, String)> {
    let Some(window) = binding_window(status) else {
        return Vec::new();
    };

    vec![
        (HEADER_LIMIT.to_string(), window.limit.to_string()),
        (HEADER_REMAINING.to_string(), window.remaining.to_string()),
        (HEADER_RESET.to_string(), ceil_secs(window.reset_at).to_string()),
    ]
}

/// Seconds until the earliest exhausted window frees a slot, at least 1.
fn retry_after(status: &[WindowStatus], now: Duration) -> u64 {
    status
        .iter()
        .filter(|s| s.remaining == 0)
        .map(|s| ceil_secs(s.reset_at.saturating_sub(now)))
        .min()
        .unwrap_or(1)
        .max(1)
}

fn ceil_secs(d: Duration) -> u64 {
    if d.subsec_nanos() > 0 {
        d.as_secs() + 1
    } else {
        d.as_secs()
    }
}
