//! Typed client for the remote auth endpoints.
//!
//! The API has shipped both `access_token` and `accessToken` spellings over
//! time; `TokenPair` parsing accepts either, preferring snake_case when a
//! response carries both.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::session::{Session, SessionUser};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthApiError {
    /// The request never produced a response (network error or timeout).
    #[error("auth request failed: {0}")]
    Request(String),
    /// The auth service answered with a non-success status.
    #[error("auth service rejected request: status {status}")]
    Rejected { status: u16, body: String },
    /// The response body was not valid JSON.
    #[error("auth response parse failed: {0}")]
    Parse(String),
    /// The response parsed but lacked one of the tokens.
    #[error("auth response missing access or refresh token")]
    MissingTokens,
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawTokens {
    access_token: Option<String>,
    #[serde(rename = "accessToken")]
    access_token_camel: Option<String>,
    refresh_token: Option<String>,
    #[serde(rename = "refreshToken")]
    refresh_token_camel: Option<String>,
}

impl RawTokens {
    fn into_pair(self) -> Result<TokenPair, AuthApiError> {
        let access_token = self.access_token.or(self.access_token_camel).filter(|t| !t.is_empty());
        let refresh_token = self.refresh_token.or(self.refresh_token_camel).filter(|t| !t.is_empty());
        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(TokenPair { access_token, refresh_token }),
            _ => Err(AuthApiError::MissingTokens),
        }
    }
}

impl TokenPair {
    /// Extract tokens from an auth response body.
    pub fn from_json(body: &serde_json::Value) -> Result<Self, AuthApiError> {
        RawTokens::deserialize(body)
            .map_err(|e| AuthApiError::Parse(e.to_string()))?
            .into_pair()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    user: SessionUser,
    #[serde(flatten)]
    tokens: RawTokens,
}

#[derive(Clone)]
pub struct AuthApi {
    http: reqwest::Client,
    base_url: String,
    refresh_timeout: Duration,
}

impl AuthApi {
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: &str, refresh_timeout: Duration) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), refresh_timeout }
    }

    /// `POST /auth/login`: exchange credentials for a full session.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthApiError> {
        let body = self.post_json("/auth/login", credentials, None).await?;
        let login: LoginBody = serde_json::from_value(body).map_err(|e| AuthApiError::Parse(e.to_string()))?;
        let tokens = login.tokens.into_pair()?;
        Ok(Session { user: login.user, access_token: tokens.access_token, refresh_token: tokens.refresh_token })
    }

    /// `POST /auth/refresh`: mint a new token pair. Bounded by the refresh timeout.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthApiError> {
        let payload = serde_json::json!({ "refresh_token": refresh_token });
        let body = self.post_json("/auth/refresh", &payload, Some(self.refresh_timeout)).await?;
        TokenPair::from_json(&body)
    }

    async fn post_json<B>(
        &self,
        path: &str,
        payload: &B,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, AuthApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.http.post(format!("{}{path}", self.base_url)).json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(|e| AuthApiError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthApiError::Rejected { status: status.as_u16(), body });
        }

        let text = resp.text().await.map_err(|e| AuthApiError::Request(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| AuthApiError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[path = "auth_api_test.rs"]
mod tests;
