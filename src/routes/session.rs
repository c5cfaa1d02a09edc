//! Session routes: login, logout, the current-user display cache, profile
//! edits and client configuration.
//!
//! Every handler returns the request's cookie jar alongside its body so the
//! browser receives whatever `Set-Cookie` changes the session store made.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::services::auth_api::{AuthApiError, Credentials};
use crate::services::session::{SessionPatch, SessionStore, SessionUser, UserPatch};
use crate::state::AppState;

// =============================================================================
// SESSION EXTRACTOR
// =============================================================================

/// Request-scoped session store built from the incoming cookies.
///
/// Never rejects; an anonymous request simply gets an empty store.
pub struct RequestSession(pub Arc<SessionStore>);

impl<S> FromRequestParts<S> for RequestSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(Self(app_state.session_store(&parts.headers)))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/session/login`: exchange credentials upstream and start a session.
pub async fn login(
    State(state): State<AppState>,
    RequestSession(session): RequestSession,
    Json(credentials): Json<Credentials>,
) -> Response {
    let created = match state.refresher.api().login(&credentials).await {
        Ok(created) => created,
        Err(AuthApiError::Rejected { status, body }) => {
            tracing::info!(status, "login rejected upstream");
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            return (status, body).into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "login request failed");
            return (StatusCode::BAD_GATEWAY, "Login service unavailable").into_response();
        }
    };

    if let Err(e) = session.create(&created) {
        tracing::error!(error = %e, "session creation failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session").into_response();
    }

    tracing::info!(user_id = %created.user.id, "session created");
    (session.jar(), Json(created.user)).into_response()
}

/// `POST /api/session/logout`: drop the session cookie.
pub async fn logout(RequestSession(session): RequestSession) -> impl IntoResponse {
    session.destroy();
    (session.jar(), StatusCode::NO_CONTENT)
}

/// `GET /api/session`: the cookie's user identity, or `null`.
///
/// Display cache only. Authorization always happens upstream.
pub async fn current(RequestSession(session): RequestSession) -> Json<Option<SessionUser>> {
    Json(session.read().map(|s| s.user))
}

/// `PATCH /api/session/profile`: rewrite cached user fields, keeping tokens.
pub async fn update_profile(RequestSession(session): RequestSession, Json(patch): Json<UserPatch>) -> Response {
    match session.update(SessionPatch::profile(patch)) {
        Ok(Some(updated)) => (session.jar(), Json(updated.user)).into_response(),
        Ok(None) => (StatusCode::UNAUTHORIZED, "Not signed in").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "profile update failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update session").into_response()
        }
    }
}

/// `GET /api/session/me`: the upstream user profile via the API client.
pub async fn me(State(state): State<AppState>, RequestSession(session): RequestSession) -> Response {
    let client = state.api_client(session.clone());
    let result = client.get_json::<serde_json::Value>("/auth/me").await;
    (session.jar(), result.map(Json)).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub api_base_url: String,
}

/// `GET /api/client-config`
pub async fn client_config(State(state): State<AppState>) -> Json<ClientConfig> {
    Json(ClientConfig { api_base_url: state.public_api_base_url.clone() })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
