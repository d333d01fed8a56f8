//! Registration and login endpoints

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::application::auth::{LoginUseCase, RegisterUserUseCase};
use crate::domain::auth::Username;
use crate::presentation::models::{ApiError, LoginRequest, MessageResponse, RegisterRequest};

/// Shared state for the auth controllers
#[derive(Clone)]
pub struct AuthAppState {
    pub register: Arc<RegisterUserUseCase>,
    pub login: Arc<LoginUseCase>,
}

/// Register a new caller and seed its rate limit bucket
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Caller registered", body = MessageResponse),
        (status = 400, description = "Invalid user data", body = crate::presentation::models::ErrorResponse),
        (status = 409, description = "Username already taken", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AuthAppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let username = Username::new(request.username).map_err(|e| ApiError(e.into()))?;
    state.register.execute(username, request.password).await?;
    Ok(Json(MessageResponse::new("User registered successfully")))
}

/// Verify a caller's credentials
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AuthAppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let username = Username::new(request.username).map_err(|e| ApiError(e.into()))?;
    state.login.execute(username, request.password).await?;
    Ok(Json(MessageResponse::new("User logged in successfully")))
}
