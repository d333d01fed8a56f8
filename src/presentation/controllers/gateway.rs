//! Proxied backend endpoints, guarded by the admission middleware

use axum::Json;

use crate::presentation::models::MessageResponse;

/// Issue an API token once the caller has been admitted.
///
/// Stand-in for the proxied backend call; by the time this handler runs
/// the admission middleware has already charged the caller's bucket.
#[utoipa::path(
    get,
    path = "/api/v1/token",
    params(
        ("User-ID" = String, Header, description = "Caller identity used for rate limiting")
    ),
    responses(
        (status = 200, description = "Token generated", body = MessageResponse),
        (status = 400, description = "Missing User-ID header", body = crate::presentation::models::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "gateway"
)]
pub async fn issue_token() -> Json<MessageResponse> {
    Json(MessageResponse::new("Token generated successfully"))
}
