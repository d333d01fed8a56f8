//! HTTP middleware for the gateway
//!
//! The admission middleware is the edge of the rate limiter: it extracts
//! the caller identity from the `User-ID` header, asks the limiter for a
//! decision and translates it into either the forwarded request or a `429`
//! with a `Retry-After` hint.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::infrastructure::rate_limiter::{AdmissionDecision, RateLimitError, RateLimiterService};
use crate::presentation::models::ErrorResponse;

/// Header carrying the caller identity, set by the edge proxy
pub const USER_ID_HEADER: &str = "User-ID";

/// Shared state for the admission middleware
#[derive(Clone)]
pub struct RateLimiterState {
    pub limiter: Arc<RateLimiterService>,
}

/// Admission control for proxied routes
pub async fn admission_middleware(
    State(state): State<RateLimiterState>,
    request: Request,
    next: Next,
) -> Response {
    let identity = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let Some(identity) = identity else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "MISSING_IDENTITY",
                format!("{USER_ID_HEADER} header is required"),
            )),
        )
            .into_response();
    };

    match state.limiter.allow_request(&identity).await {
        Ok(decision) if decision.allowed => {
            let mut response = next.run(request).await;
            apply_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        Ok(decision) => {
            let retry_after = decision.retry_after.unwrap_or_default();
            tracing::debug!(
                identity = %identity,
                retry_after_secs = retry_after.as_secs(),
                "rate limit exceeded"
            );
            too_many_requests(&decision, retry_after)
        }
        Err(RateLimitError::InvalidIdentity) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "MISSING_IDENTITY",
                format!("{USER_ID_HEADER} header is required"),
            )),
        )
            .into_response(),
        Err(err) => {
            // Quota state is unknown, so the request is denied (fail
            // closed) with the flat interval as the retry hint.
            tracing::warn!(
                identity = %identity,
                error = %err,
                "admission check failed, denying request"
            );
            let retry_after = state.limiter.policy().refill_interval;
            let decision =
                AdmissionDecision::denied(state.limiter.policy().max_tokens, 0, retry_after);
            too_many_requests(&decision, retry_after)
        }
    }
}

fn too_many_requests(decision: &AdmissionDecision, retry_after: Duration) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse::new("RATE_LIMITED", "Rate limit exceeded")),
    )
        .into_response();

    let headers = response.headers_mut();
    apply_rate_limit_headers(headers, decision);
    headers.insert(
        header::RETRY_AFTER,
        HeaderValue::from(retry_after_secs(retry_after)),
    );

    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &AdmissionDecision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
}

/// Whole seconds, rounded up so a client never retries early
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}
