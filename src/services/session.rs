//! Session model and the request-scoped session store.
//!
//! ARCHITECTURE
//! ============
//! The browser's cookie store owns the session. `SessionStore` wraps one
//! request's `CookieJar`, decodes the `session` cookie on demand and records
//! writes as jar deltas that the handler returns with its response. Nothing
//! is cached across requests.
//!
//! TRADE-OFFS
//! ==========
//! Concurrent requests write the cookie independently (last writer wins).
//! Token refreshes are idempotent replacements, so the only cost of a lost
//! race is one wasted refresh round trip.

use std::sync::{Mutex, PoisonError};

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use super::envelope::{EnvelopeError, SessionCodec};

pub const SESSION_COOKIE_NAME: &str = "session";

// =============================================================================
// SESSION MODEL
// =============================================================================

/// Identity of the signed-in user. A display cache only: the API remains the
/// authority for anything permission related.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

/// One authenticated browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    /// A session is usable only when identity and both tokens are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user.id.is_empty() && !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    fn merge(&mut self, patch: SessionPatch) {
        if let Some(token) = patch.access_token {
            self.access_token = token;
        }
        if let Some(token) = patch.refresh_token {
            self.refresh_token = token;
        }
        let user = patch.user;
        if let Some(name) = user.name {
            self.user.name = name;
        }
        if let Some(email) = user.email {
            self.user.email = email;
        }
        if user.role.is_some() {
            self.user.role = user.role;
        }
        if user.plan_id.is_some() {
            self.user.plan_id = user.plan_id;
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Fields of `SessionUser` that may be patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub plan_id: Option<String>,
}

impl UserPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.plan_id.is_none()
    }
}

/// Shallow merge applied by `SessionStore::update`. Absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: UserPatch,
}

impl SessionPatch {
    #[must_use]
    pub fn tokens(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: Some(access_token.into()), refresh_token: Some(refresh_token.into()), ..Self::default() }
    }

    #[must_use]
    pub fn profile(user: UserPatch) -> Self {
        Self { user, ..Self::default() }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to seal session: {0}")]
    Seal(#[from] EnvelopeError),
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Request-scoped accessor for the session cookie.
pub struct SessionStore {
    codec: SessionCodec,
    jar: Mutex<CookieJar>,
}

impl SessionStore {
    #[must_use]
    pub fn new(codec: SessionCodec, jar: CookieJar) -> Self {
        Self { codec, jar: Mutex::new(jar) }
    }

    /// Build a store from the incoming request's `Cookie` headers.
    #[must_use]
    pub fn from_headers(codec: SessionCodec, headers: &HeaderMap) -> Self {
        Self::new(codec, CookieJar::from_headers(headers))
    }

    /// Snapshot of the jar including pending `Set-Cookie` deltas.
    #[must_use]
    pub fn jar(&self) -> CookieJar {
        self.lock().clone()
    }

    /// Persist `session` as a freshly signed cookie, replacing any existing one.
    /// The cookie expires seven days from now.
    pub fn create(&self, session: &Session) -> Result<(), SessionError> {
        let (token, expires_at) = self.codec.seal(session, OffsetDateTime::now_utc())?;
        let cookie = Cookie::build((SESSION_COOKIE_NAME, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.codec.secure_cookies())
            .expires(expires_at);

        let mut jar = self.lock();
        *jar = jar.clone().add(cookie);
        tracing::debug!(user_id = %session.user.id, "session cookie written");
        Ok(())
    }

    /// Decode the current session. Missing, expired, tampered, malformed and
    /// incomplete cookies all read as `None`.
    #[must_use]
    pub fn read(&self) -> Option<Session> {
        let token = self.lock().get(SESSION_COOKIE_NAME).map(|c| c.value().to_owned())?;
        if token.is_empty() {
            return None;
        }

        match self.codec.open(&token) {
            Ok(claims) if claims.session.is_complete() => Some(claims.session),
            Ok(claims) => {
                tracing::warn!(user_id = %claims.session.user.id, "session cookie incomplete, ignoring");
                None
            }
            Err(e) => {
                tracing::debug!(reason = e.reason(), error = %e, "session cookie rejected");
                None
            }
        }
    }

    /// Merge `patch` into the current session and re-persist it, which also
    /// restarts the seven-day expiry window.
    ///
    /// Returns `Ok(None)` without writing anything when no session exists.
    pub fn update(&self, patch: SessionPatch) -> Result<Option<Session>, SessionError> {
        let Some(mut session) = self.read() else {
            tracing::error!(
                profile_fields = !patch.user.is_empty(),
                token_fields = patch.access_token.is_some() || patch.refresh_token.is_some(),
                "session update requested with no active session; changes dropped"
            );
            return Ok(None);
        };

        session.merge(patch);
        self.create(&session)?;
        Ok(Some(session))
    }

    /// Remove the session cookie. Safe to call when none exists.
    pub fn destroy(&self) {
        let mut jar = self.lock();
        *jar = jar.clone().remove(Cookie::build((SESSION_COOKIE_NAME, "")).path("/"));
        tracing::debug!("session cookie removed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CookieJar> {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
