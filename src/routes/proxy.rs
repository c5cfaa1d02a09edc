//! Business API proxy.
//!
//! `ANY /api/v1/{*path}` forwards to `{api_base}/{path}` through the
//! authenticated client. Method, still-encoded path, query string and JSON
//! body go out verbatim; status, end-to-end headers and body come back
//! verbatim. Bodies are never inspected beyond checking that they are JSON.

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

use super::session::RequestSession;
use crate::services::api_client::ApiRequest;
use crate::state::AppState;

pub const PROXY_PREFIX: &str = "/api/v1";

pub async fn forward(
    State(state): State<AppState>,
    RequestSession(session): RequestSession,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = upstream_path(&uri);
    let mut request = ApiRequest::new(method, path);
    if let Some(query) = query {
        request = request.with_query(query);
    }

    match json_body(&headers, &body) {
        Ok(Some(value)) => request = request.with_body(value),
        Ok(None) => {}
        Err(rejection) => return rejection,
    }

    let result = state.api_client(session.clone()).send(request).await;
    (session.jar(), result).into_response()
}

/// Raw request path minus the proxy prefix. `Path` would percent-decode it,
/// letting `%3F`, `%2F` or `%23` in a segment reshape the upstream URL.
fn upstream_path(uri: &Uri) -> String {
    let raw = uri.path();
    let rest = raw.strip_prefix(PROXY_PREFIX).unwrap_or(raw);
    if rest.starts_with('/') { rest.to_owned() } else { format!("/{rest}") }
}

/// Empty bodies forward as no body; anything else must be JSON.
fn json_body(headers: &HeaderMap, body: &Bytes) -> Result<Option<serde_json::Value>, Response> {
    if body.is_empty() {
        return Ok(None);
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return Err((StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected application/json body").into_response());
    }

    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}")).into_response())
}

#[cfg(test)]
#[path = "proxy_test.rs"]
mod tests;
