//! Route guard middleware.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs in front of every page request, before any handler. Two states only:
//! authenticated when the `session` cookie carries a valid, unexpired
//! signature, unauthenticated otherwise. The payload is not trusted or
//! decoded, and no refresh is attempted here; refresh belongs to the API
//! client.
//!
//! RULES
//! =====
//! - protected path + unauthenticated -> redirect to login
//! - public (auth surface) path + authenticated -> redirect to dashboard
//! - anything else, and every excluded path, passes through

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::services::api_client::LOGIN_PATH;
use crate::services::envelope::SessionCodec;
use crate::services::session::SESSION_COOKIE_NAME;
use crate::state::AppState;

pub const DASHBOARD_PATH: &str = "/dashboard";

const PUBLIC_ROUTES: &[&str] = &["/auth/login", "/auth/sign-up", "/auth/forget-password", "/auth/new-password"];
const PROTECTED_ROUTES: &[&str] = &[DASHBOARD_PATH];
const EXCLUDED_PREFIXES: &[&str] = &["/api", "/_next/static", "/_next/image", "/assets", "/favicon.ico", "/healthz"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteRules {
    pub public: Vec<String>,
    pub protected: Vec<String>,
    pub excluded: Vec<String>,
    pub login_path: String,
    pub home_path: String,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            public: owned(PUBLIC_ROUTES),
            protected: owned(PROTECTED_ROUTES),
            excluded: owned(EXCLUDED_PREFIXES),
            login_path: LOGIN_PATH.to_owned(),
            home_path: DASHBOARD_PATH.to_owned(),
        }
    }
}

impl RouteRules {
    /// Static assets and framework-internal paths are never guarded.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        let has_extension = path.rsplit('/').next().is_some_and(|segment| segment.contains('.'));
        has_extension || self.excluded.iter().any(|prefix| under(path, prefix))
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|route| under(path, route))
    }

    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|route| under(path, route))
    }

    #[must_use]
    pub fn decide(&self, path: &str, authenticated: bool) -> GuardDecision {
        let path = canonical(path);
        let path = path.as_str();
        if self.is_excluded(path) {
            return GuardDecision::Allow;
        }
        if !authenticated && self.is_protected(path) {
            return GuardDecision::Redirect(self.login_path.clone());
        }
        if authenticated && self.is_public(path) {
            return GuardDecision::Redirect(self.home_path.clone());
        }
        GuardDecision::Allow
    }
}

fn owned(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| (*p).to_owned()).collect()
}

/// Collapse repeated slashes and `.` segments the way the static file
/// service resolves them, so `//dashboard` and `/./dashboard` classify as
/// `/dashboard`.
fn canonical(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    format!("/{}", segments.join("/"))
}

/// `path` equals `route` or lies beneath it on a segment boundary.
fn under(path: &str, route: &str) -> bool {
    match path.strip_prefix(route) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Signature + expiry check only.
#[must_use]
pub fn is_authenticated(codec: &SessionCodec, jar: &CookieJar) -> bool {
    let Some(cookie) = jar.get(SESSION_COOKIE_NAME) else {
        return false;
    };
    match codec.verify(cookie.value()) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(reason = e.reason(), "route guard rejected session cookie");
            false
        }
    }
}

pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = canonical(request.uri().path());
    if state.rules.is_excluded(&path) {
        return next.run(request).await;
    }

    let authenticated = is_authenticated(&state.codec, &CookieJar::from_headers(request.headers()));
    match state.rules.decide(&path, authenticated) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(to) => {
            tracing::debug!(%path, authenticated, redirect = %to, "route guard redirect");
            Redirect::temporary(&to).into_response()
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
