//! Route definitions and server setup

use std::time::Duration;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ServerConfig;
use crate::presentation::controllers::auth::{AuthAppState, login, register};
use crate::presentation::controllers::gateway::issue_token;
use crate::presentation::controllers::health::health_check;
use crate::presentation::middleware::{RateLimiterState, admission_middleware};
use crate::presentation::models::{
    ErrorResponse, HealthResponse, LoginRequest, MessageResponse, RegisterRequest,
};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::auth::register,
        crate::presentation::controllers::auth::login,
        crate::presentation::controllers::gateway::issue_token,
        crate::presentation::controllers::health::health_check
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            MessageResponse,
            ErrorResponse,
            HealthResponse
        )
    ),
    tags(
        (name = "auth", description = "Caller registration and login"),
        (name = "gateway", description = "Rate limited passthrough endpoints"),
        (name = "health", description = "System health monitoring")
    ),
    info(
        title = "Gatewarden API",
        description = "API gateway front door: caller registration, login, and token-bucket rate limited access to the backend.",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    )
)]
pub struct ApiDoc;

/// Build the application router
pub fn create_router(
    config: &ServerConfig,
    auth_state: AuthAppState,
    limiter_state: RateLimiterState,
) -> Router {
    // Every route under /api/v1 goes through admission control.
    let proxied_routes = Router::new()
        .route("/api/v1/token", get(issue_token))
        .layer(middleware::from_fn_with_state(
            limiter_state,
            admission_middleware,
        ));

    let router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(auth_state)
        .merge(proxied_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&config.allowed_origins))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.request_timeout_seconds,
                ))),
        );

    if config.enable_docs {
        router.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    }
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
