//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` holds only process-wide, request-independent pieces: the
//! envelope codec, the shared token refresher (and its single-flight table),
//! the outbound HTTP client and route rules. Session access is never stored
//! here; handlers build a `SessionStore` per request and inject it into the
//! `ApiClient` they create.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::config::AppConfig;
use crate::routes::guard::RouteRules;
use crate::services::api_client::ApiClient;
use crate::services::auth_api::{AuthApi, AuthApiError};
use crate::services::envelope::SessionCodec;
use crate::services::refresh::TokenRefresher;
use crate::services::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub codec: SessionCodec,
    pub refresher: TokenRefresher,
    pub http: reqwest::Client,
    pub api_base_url: String,
    pub public_api_base_url: String,
    pub rules: Arc<RouteRules>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, AuthApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()
            .map_err(|e| AuthApiError::HttpClientBuild(e.to_string()))?;
        let auth_api = AuthApi::with_client(http.clone(), &config.api_base_url, config.refresh_timeout);

        Ok(Self {
            codec: SessionCodec::new(config.session_secret.as_bytes(), config.secure_cookies),
            refresher: TokenRefresher::new(auth_api),
            http,
            api_base_url: config.api_base_url.clone(),
            public_api_base_url: config.public_api_base_url.clone(),
            rules: Arc::new(RouteRules::default()),
        })
    }

    /// Session store for one request.
    #[must_use]
    pub fn session_store(&self, headers: &HeaderMap) -> Arc<SessionStore> {
        Arc::new(SessionStore::from_headers(self.codec.clone(), headers))
    }

    /// API client bound to one request's session.
    #[must_use]
    pub fn api_client(&self, session: Arc<SessionStore>) -> ApiClient {
        ApiClient::new(self.http.clone(), &self.api_base_url, session, self.refresher.clone())
            .with_login_path(self.rules.login_path.clone())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::services::session::{SESSION_COOKIE_NAME, Session, SessionUser};
    use axum::Router;
    use time::OffsetDateTime;

    pub const TEST_SECRET: &str = "tallybook-test-secret";

    /// Config pointing at `api_base_url` with a fixed signing secret.
    #[must_use]
    pub fn test_config(api_base_url: &str) -> AppConfig {
        let api_base_url = api_base_url.to_owned();
        AppConfig::from_lookup(|key| match key {
            "API_BASE_URL" => Some(api_base_url.clone()),
            "SESSION_SECRET" => Some(TEST_SECRET.to_owned()),
            "REFRESH_TIMEOUT_SECS" => Some("2".to_owned()),
            "API_TIMEOUT_SECS" => Some("5".to_owned()),
            "STATIC_DIR" => Some("tests/fixtures/does-not-exist".to_owned()),
            _ => None,
        })
        .expect("test config should parse")
    }

    #[must_use]
    pub fn test_app_state(api_base_url: &str) -> AppState {
        AppState::from_config(&test_config(api_base_url)).expect("test state should build")
    }

    #[must_use]
    pub fn test_session() -> Session {
        Session {
            user: SessionUser {
                id: "42".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                role: Some("owner".into()),
                plan_id: Some("free".into()),
            },
            access_token: "a-1".into(),
            refresh_token: "r-1".into(),
        }
    }

    /// `Cookie` header value carrying `session` sealed at `issued_at`.
    #[must_use]
    pub fn session_cookie(state: &AppState, session: &Session, issued_at: OffsetDateTime) -> String {
        let (token, _) = state.codec.seal(session, issued_at).expect("seal should succeed");
        format!("{SESSION_COOKIE_NAME}={token}")
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server failed");
        });
        format!("http://{addr}")
    }

    /// HTTP client that reports redirects instead of following them.
    #[must_use]
    pub fn no_redirect_client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("client should build")
    }
}
