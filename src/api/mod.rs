//! HTTP plumbing shared by the Lemlist and HubSpot clients.
//!
//! Every remote call goes through `RequestClient::execute`, which owns the
//! retry loop, rate-limit compliance, and the error taxonomy. Callers never
//! see HTTP status codes — only `ApiError` variants.

pub mod hubspot;
pub mod lemlist;
pub mod pagination;

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::Value;

// ============================================================================
// Error taxonomy
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad credentials. Never retried — retrying cannot fix a bad token.
    #[error("invalid API credentials")]
    Unauthorized,

    /// Missing remote resource. Never retried; most callers treat this as an
    /// empty result.
    #[error("remote resource not found")]
    NotFound,

    /// Rate limit still exceeded after all retries. Carries the last wait
    /// hint the provider advertised so callers can tell a human.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Timeout or connection failure after all retries.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Any other non-2xx after all retries.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The remote returned a 2xx with a body we couldn't decode.
    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A request attempt that failed before producing an HTTP response.
#[derive(Debug)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Retry loop
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Transport-level snapshot of one response, before taxonomy mapping.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// `Retry-After` in seconds, when advertised.
    pub retry_after: Option<u64>,
    /// `X-RateLimit-Remaining`, when advertised.
    pub rate_remaining: Option<u64>,
    /// `X-RateLimit-Reset` as a unix timestamp, when advertised.
    pub rate_reset_epoch: Option<u64>,
    pub body: String,
}

/// Exponential fallback: 1s, 2s, 4s, ... for the zero-indexed attempt.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Extract a human-readable error message from a response body, preferring a
/// structured `message` field over the raw text.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    body.to_string()
}

/// Drive one request through the capped retry loop.
///
/// `attempt_fn` must produce a fresh attempt on every call; the future it
/// returns owns its request so attempts never alias each other.
///
/// - 429: sleep the advertised `Retry-After` (exponential fallback when the
///   header is absent) and retry; exhaustion surfaces `RateLimited` with the
///   last wait.
/// - Transport failure or any other ≥400: exponential backoff and retry;
///   exhaustion surfaces `Transport` / `Api`.
/// - 401 and 404 surface immediately — no retry.
pub async fn execute_with_retry<F, Fut>(
    mut attempt_fn: F,
    policy: &RetryPolicy,
) -> Result<RawResponse, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RawResponse, TransportError>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 0..attempts {
        let last = attempt + 1 == attempts;
        match attempt_fn().await {
            Ok(resp) => match resp.status {
                401 => return Err(ApiError::Unauthorized),
                404 => return Err(ApiError::NotFound),
                429 => {
                    let wait = resp
                        .retry_after
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| backoff_delay(attempt));
                    if last {
                        return Err(ApiError::RateLimited { retry_after: wait });
                    }
                    log::warn!(
                        "Rate limit hit, waiting {:?} (attempt {}/{})",
                        wait,
                        attempt + 1,
                        attempts
                    );
                    tokio::time::sleep(wait).await;
                }
                status if status >= 400 => {
                    if last {
                        return Err(ApiError::Api {
                            status,
                            message: extract_error_message(&resp.body),
                        });
                    }
                    let wait = backoff_delay(attempt);
                    log::warn!(
                        "API error {} — retrying in {:?} (attempt {}/{})",
                        status,
                        wait,
                        attempt + 1,
                        attempts
                    );
                    tokio::time::sleep(wait).await;
                }
                _ => return Ok(resp),
            },
            Err(err) => {
                if last {
                    return Err(ApiError::Transport(err.to_string()));
                }
                let wait = backoff_delay(attempt);
                log::warn!(
                    "Transport error: {} — retrying in {:?} (attempt {}/{})",
                    err,
                    wait,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(wait).await;
            }
        }
    }

    Err(ApiError::Transport("request exhausted retries".to_string()))
}

// ============================================================================
// Request client
// ============================================================================

/// Authentication mode for a provider.
pub enum Auth {
    /// HTTP Basic with an empty username; the key is the password (Lemlist).
    Basic(String),
    /// Bearer token (HubSpot private app).
    Bearer(String),
}

/// Rate-limit-aware HTTP client for one provider.
///
/// One instance serializes its own calls (see the crate docs on concurrency);
/// there is no in-flight request overlap to coordinate.
pub struct RequestClient {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
    policy: RetryPolicy,
    /// Proactively pause before the next call when remaining quota drops
    /// below this many requests.
    low_water: Option<u64>,
    pending_pause: Mutex<Option<Duration>>,
}

impl RequestClient {
    pub fn new(
        base_url: &str,
        auth: Auth,
        timeout: Duration,
        policy: RetryPolicy,
        low_water: Option<u64>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            policy,
            low_water,
            pending_pause: Mutex::new(None),
        })
    }

    /// Execute a request and decode the JSON body.
    ///
    /// An empty 2xx body (e.g. 204 from batch archive) decodes to
    /// `Value::Null`.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        // Quota-courtesy pause recorded by the previous call, if any.
        let pause = self.pending_pause.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(pause) = pause {
            log::info!("Quota low — pausing {:?} before next request", pause);
            tokio::time::sleep(pause).await;
        }

        let url = format!("{}{}", self.base_url, path);
        let resp = execute_with_retry(
            || dispatch(self.build_request(method.clone(), &url, query, body)),
            &self.policy,
        )
        .await?;

        self.note_quota(&resp);

        if resp.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&resp.body)?)
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if !query.is_empty() {
            req = req.query(query);
        }
        req = match &self.auth {
            Auth::Basic(key) => req.basic_auth("", Some(key)),
            Auth::Bearer(token) => req.bearer_auth(token),
        };
        if let Some(body) = body {
            req = req.json(body);
        }
        req
    }

    /// Record a proactive pause for the *next* call when the provider reports
    /// low remaining quota. Read-side optimization only — correctness never
    /// depends on it.
    fn note_quota(&self, resp: &RawResponse) {
        let (Some(threshold), Some(remaining)) = (self.low_water, resp.rate_remaining) else {
            return;
        };
        if remaining >= threshold {
            return;
        }
        let Some(reset_epoch) = resp.rate_reset_epoch else {
            return;
        };
        let now = Utc::now().timestamp().max(0) as u64;
        let wait = reset_epoch.saturating_sub(now);
        if wait == 0 {
            return;
        }
        log::warn!(
            "Rate limit low ({} remaining), next request waits {}s",
            remaining,
            wait
        );
        if let Ok(mut pending) = self.pending_pause.lock() {
            *pending = Some(Duration::from_secs(wait));
        }
    }
}

/// Send one built request and snapshot the response. The returned future owns
/// the request, so `execute_with_retry` can build a fresh attempt each time.
async fn dispatch(req: reqwest::RequestBuilder) -> Result<RawResponse, TransportError> {
    let resp = req.send().await.map_err(|e| TransportError(e.to_string()))?;

    let status = resp.status().as_u16();
    let (retry_after, rate_remaining, rate_reset_epoch) = {
        let header_u64 = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };
        (
            header_u64("Retry-After"),
            header_u64("X-RateLimit-Remaining"),
            header_u64("X-RateLimit-Reset"),
        )
    };

    let body = resp
        .text()
        .await
        .map_err(|e| TransportError(e.to_string()))?;

    Ok(RawResponse {
        status,
        retry_after,
        rate_remaining,
        rate_reset_epoch,
        body,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ok_response(body: &str) -> RawResponse {
        RawResponse {
            status: 200,
            retry_after: None,
            rate_remaining: None,
            rate_reset_epoch: None,
            body: body.to_string(),
        }
    }

    fn status_response(status: u16, retry_after: Option<u64>) -> RawResponse {
        RawResponse {
            status,
            retry_after,
            rate_remaining: None,
            rate_reset_epoch: None,
            body: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_sleeps_advertised_wait() {
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let resp = execute_with_retry(
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n <= 2 {
                        Ok(status_response(429, Some(3)))
                    } else {
                        Ok(ok_response("{\"ok\":true}"))
                    }
                }
            },
            &RetryPolicy::default(),
        )
        .await
        .expect("third attempt succeeds");

        assert_eq!(resp.status, 200);
        assert_eq!(calls.get(), 3);
        // Two failures at 3s advertised wait each.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion_carries_last_wait() {
        let result = execute_with_retry(
            || async { Ok(status_response(429, Some(7))) },
            &RetryPolicy::default(),
        )
        .await;

        match result {
            Err(ApiError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(7));
            }
            other => panic!("expected RateLimited, got {:?}", other.map(|r| r.status)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_without_header_uses_exponential_fallback() {
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let _ = execute_with_retry(
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n <= 2 {
                        Ok(status_response(429, None))
                    } else {
                        Ok(ok_response("{}"))
                    }
                }
            },
            &RetryPolicy::default(),
        )
        .await
        .unwrap();

        // 2^0 + 2^1 seconds
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let calls = Cell::new(0u32);
        let result = execute_with_retry(
            || {
                calls.set(calls.get() + 1);
                async { Ok(status_response(401, None)) }
            },
            &RetryPolicy::default(),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = Cell::new(0u32);
        let result = execute_with_retry(
            || {
                calls.set(calls.get() + 1);
                async { Ok(status_response(404, None)) }
            },
            &RetryPolicy::default(),
        )
        .await;

        assert!(matches!(result, Err(ApiError::NotFound)));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_retry_then_surface() {
        let calls = Cell::new(0u32);
        let result = execute_with_retry(
            || {
                calls.set(calls.get() + 1);
                async { Err(TransportError("connection reset".to_string())) }
            },
            &RetryPolicy::default(),
        )
        .await;

        match result {
            Err(ApiError::Transport(msg)) => assert!(msg.contains("connection reset")),
            other => panic!("expected Transport, got {:?}", other.map(|r| r.status)),
        }
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_retries_then_surfaces_api_error() {
        let calls = Cell::new(0u32);
        let result = execute_with_retry(
            || {
                calls.set(calls.get() + 1);
                async {
                    Ok(RawResponse {
                        status: 500,
                        retry_after: None,
                        rate_remaining: None,
                        rate_reset_epoch: None,
                        body: "{\"message\":\"internal error\"}".to_string(),
                    })
                }
            },
            &RetryPolicy::default(),
        )
        .await;

        match result {
            Err(ApiError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal error");
            }
            other => panic!("expected Api, got {:?}", other.map(|r| r.status)),
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_extract_error_message_prefers_structured_field() {
        assert_eq!(
            extract_error_message("{\"message\":\"contact not writable\",\"status\":\"error\"}"),
            "contact not writable"
        );
        assert_eq!(extract_error_message("plain text body"), "plain text body");
    }
}
