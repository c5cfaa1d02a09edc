//! Token refresh procedure.
//!
//! ARCHITECTURE
//! ============
//! One `TokenRefresher` lives in application state and is shared by every
//! request. Exchanges are keyed by refresh token in a single-flight table, so
//! a burst of concurrent `401`s from one browser costs one call to
//! `/auth/refresh`. Each waiter then writes the shared result into its own
//! request's session store.
//!
//! ERROR HANDLING
//! ==============
//! Every failure collapses to `None` after being logged. Callers treat `None`
//! as terminal and never retry.

use super::auth_api::{AuthApi, TokenPair};
use super::flight::SingleFlight;
use super::session::{SessionPatch, SessionStore};

#[derive(Clone)]
pub struct TokenRefresher {
    api: AuthApi,
    inflight: SingleFlight<String, Option<TokenPair>>,
}

impl TokenRefresher {
    #[must_use]
    pub fn new(api: AuthApi) -> Self {
        Self { api, inflight: SingleFlight::new() }
    }

    #[must_use]
    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    /// Exchange `refresh_token` for a new pair, store it in `session`, and
    /// return the new access token. `None` means the refresh failed.
    pub async fn refresh_access_token(&self, session: &SessionStore, refresh_token: &str) -> Option<String> {
        let tokens = self.exchange(refresh_token).await?;

        match session.update(SessionPatch::tokens(tokens.access_token.clone(), tokens.refresh_token)) {
            Ok(Some(_)) => tracing::info!("session tokens refreshed"),
            Ok(None) => tracing::warn!("refreshed tokens not persisted: session vanished during refresh"),
            Err(e) => tracing::error!(error = %e, "refreshed tokens not persisted"),
        }

        Some(tokens.access_token)
    }

    /// Coalesced call to `/auth/refresh`.
    pub async fn exchange(&self, refresh_token: &str) -> Option<TokenPair> {
        let api = self.api.clone();
        let token = refresh_token.to_owned();

        self.inflight
            .run(refresh_token.to_owned(), move || async move {
                match api.refresh(&token).await {
                    Ok(tokens) => Some(tokens),
                    Err(e) => {
                        tracing::warn!(error = %e, "token refresh failed");
                        None
                    }
                }
            })
            .await
            .flatten()
    }
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
