//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The gateway owns the `session` cookie on behalf of the browser. Session
//! endpoints and the business API proxy live under `/api`; every other path
//! is served from the static frontend build. The route guard wraps the whole
//! router and decides per path whether to skip, pass or redirect.

pub mod guard;
pub mod proxy;
pub mod session;

use std::path::Path;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{any, get, patch, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full gateway router: API routes, static frontend fallback, guard, tracing.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    let frontend = ServeDir::new(static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/api/session", get(session::current))
        .route("/api/session/login", post(session::login))
        .route("/api/session/logout", post(session::logout))
        .route("/api/session/profile", patch(session::update_profile))
        .route("/api/session/me", get(session::me))
        .route("/api/client-config", get(session::client_config))
        .route(&format!("{}/{{*path}}", proxy::PROXY_PREFIX), any(proxy::forward))
        .route("/healthz", get(healthz))
        .fallback_service(frontend)
        .layer(from_fn_with_state(state.clone(), guard::route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
