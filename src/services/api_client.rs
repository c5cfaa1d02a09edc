//! Authenticated API client: the single choke point for outbound API calls.
//!
//! ARCHITECTURE
//! ============
//! An `ApiClient` is built per request around that request's
//! `SessionStore`. Every call reads the session, attaches the bearer token,
//! and on `401` runs at most one refresh-and-replay cycle:
//!
//! ```text
//! send ──► 401 ──► retried? ──yes──► Status(401)
//!                     │ no
//!                     ▼
//!              refresh (single-flight)
//!                 │            │
//!              token        no token
//!                 ▼            ▼
//!          replay once    destroy session ──► ReauthRequired
//! ```
//!
//! The client never inspects business response bodies; it returns them as
//! raw bytes with their status and end-to-end headers.

use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde::de::DeserializeOwned;

use super::refresh::TokenRefresher;
use super::session::SessionStore;

pub const LOGIN_PATH: &str = "/auth/login";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received (connect failure, timeout, ...).
    #[error("API request failed: {0}")]
    Transport(String),
    /// The API answered with a non-success status. Passed through verbatim.
    #[error("API responded with status {status}")]
    Status { status: StatusCode, headers: HeaderMap, body: Vec<u8> },
    /// A response body the caller asked to decode was not the expected JSON.
    #[error("API response decode failed: {0}")]
    Decode(String),
    /// Refresh failed; the session was destroyed and the user must log in again.
    #[error("session expired, re-authentication required")]
    ReauthRequired { login_path: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Status { status, headers, body } => passthrough(status, headers, body),
            Self::ReauthRequired { login_path } => Redirect::to(&login_path).into_response(),
            Self::Transport(_) | Self::Decode(_) => {
                tracing::warn!(error = %self, "upstream API failure");
                (StatusCode::BAD_GATEWAY, "Upstream API unavailable").into_response()
            }
        }
    }
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// Replayable description of one API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: None, body: None, retried: false }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Raw query string without the leading `?`.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = if query.is_empty() { None } else { Some(query) };
        self
    }
}

/// Upstream response with hop-by-hop headers already stripped.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        passthrough(self.status, self.headers, self.body)
    }
}

/// Headers that describe the upstream connection rather than the payload.
const HOP_BY_HOP: &[header::HeaderName] = &[
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn end_to_end(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers
}

/// Upstream values replace the defaults axum picks for a byte body.
fn passthrough(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Response {
    let mut response = (status, body).into_response();
    response.headers_mut().extend(headers);
    response
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    refresher: TokenRefresher,
    login_path: String,
}

impl ApiClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, session: Arc<SessionStore>, refresher: TokenRefresher) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            refresher,
            login_path: LOGIN_PATH.to_owned(),
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Send `request`, transparently refreshing and replaying once on `401`.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut bearer = self.session.read().map(|s| s.access_token);
        if bearer.is_none() {
            tracing::warn!(method = %request.method, path = %request.path, "no access token, sending unauthenticated");
        }

        loop {
            let response = self.dispatch(&request, bearer.as_deref()).await?;
            if response.status != StatusCode::UNAUTHORIZED || request.retried {
                return Self::finish(response);
            }

            request.retried = true;
            tracing::info!(method = %request.method, path = %request.path, "access token rejected, refreshing");

            let refreshed = match self.session.read() {
                Some(session) => self.refresher.refresh_access_token(&self.session, &session.refresh_token).await,
                None => None,
            };

            match refreshed {
                Some(token) => bearer = Some(token),
                None => return Err(self.teardown()),
            }
        }
    }

    /// `GET` a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    fn teardown(&self) -> ApiError {
        tracing::warn!(login_path = %self.login_path, "refresh failed, ending session");
        self.session.destroy();
        ApiError::ReauthRequired { login_path: self.login_path.clone() }
    }

    async fn dispatch(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, ApiError> {
        let mut url = format!("{}{}", self.base_url, request.path);
        if let Some(query) = &request.query {
            url.push('?');
            url.push_str(query);
        }

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = resp.status();
        let headers = end_to_end(resp.headers());
        let body = resp.bytes().await.map_err(|e| ApiError::Transport(e.to_string()))?;

        tracing::debug!(method = %request.method, path = %request.path, status = status.as_u16(), "API call finished");
        Ok(ApiResponse { status, headers, body: body.to_vec() })
    }

    fn finish(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.status.is_success() {
            return Ok(response);
        }
        Err(ApiError::Status { status: response.status, headers: response.headers, body: response.body })
    }
}

#[cfg(test)]
#[path = "api_client_test.rs"]
mod tests;
