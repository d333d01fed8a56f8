//! Gatewarden - API gateway front door with distributed rate limiting
//!
//! Callers register and authenticate against the gateway, then every
//! proxied request is admission-controlled by a token bucket whose state
//! lives in a shared Redis store, so any number of gateway instances
//! enforce one consistent per-caller quota.
//!
//! # Modules
//!
//! - [`config`] — Strongly-typed configuration with file and environment variable support
//! - [`domain`] — Caller entities, value objects and repository traits
//! - [`application`] — Registration and login use cases, shared error types
//! - [`infrastructure`] — Bucket store backends, the token bucket engine and the limiter facade
//! - [`presentation`] — Axum routes, admission middleware and DTOs
//! - [`logging`] — Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! admission endpoint -> rate limiter facade -> token bucket engine
//!                                           -> bucket store adapter -> shared store
//! ```
//!
//! The engine is a pure function of `(tokens, last_refill, now)`; the store
//! adapter makes the surrounding read-modify-write cycle atomic with
//! versioned conditional writes, so two gateway instances can never both
//! spend the same token.
//!
//! # Configuration
//!
//! Environment variables use the `GATEWARDEN__` prefix with double
//! underscore separators:
//!
//! ```bash
//! GATEWARDEN__SERVER__PORT=8080
//! GATEWARDEN__RATE_LIMIT__MAX_TOKENS=2
//! ```

pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

pub use app::create_app;
pub use config::Config;
pub use logging::init_tracing;
