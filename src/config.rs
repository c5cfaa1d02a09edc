//! Gateway configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! `AppConfig::from_env` is a thin wrapper over `from_lookup`, which takes
//! any key -> value function. Tests drive `from_lookup` with a map so they
//! never touch the process environment.
//!
//! SECURITY
//! ========
//! The session signing secret has an insecure development default. In
//! production mode the secret must be set explicitly and must differ from
//! that default; otherwise startup fails.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATIC_DIR: &str = "dist";
pub const DEV_SESSION_SECRET: &str = "tallybook-dev-session-secret-do-not-use-in-production";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SESSION_SECRET is required in production")]
    MissingSessionSecret,
    #[error("SESSION_SECRET must not use the development default in production")]
    DevSecretInProduction,
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Base URL for server-side calls to the remote API.
    pub api_base_url: String,
    /// Base URL the browser uses for its own API calls.
    pub public_api_base_url: String,
    pub session_secret: String,
    pub production: bool,
    pub secure_cookies: bool,
    pub refresh_timeout: Duration,
    pub api_timeout: Duration,
    pub static_dir: PathBuf,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("api_base_url", &self.api_base_url)
            .field("public_api_base_url", &self.public_api_base_url)
            .field("session_secret", &"<redacted>")
            .field("production", &self.production)
            .field("secure_cookies", &self.secure_cookies)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("api_timeout", &self.api_timeout)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `API_BASE_URL`: default `http://localhost:8000`
    /// - `PUBLIC_API_BASE_URL`: default `API_BASE_URL`
    /// - `SESSION_SECRET`: required when `APP_ENV=production`
    /// - `APP_ENV`: `production` enables production mode
    /// - `COOKIE_SECURE`: overrides the `Secure` cookie flag (default: production mode)
    /// - `REFRESH_TIMEOUT_SECS`: default 15
    /// - `API_TIMEOUT_SECS`: default 30
    /// - `STATIC_DIR`: default `dist`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = lookup("APP_ENV").is_some_and(|v| v.trim().eq_ignore_ascii_case("production"));

        let session_secret = match lookup("SESSION_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) if production && secret == DEV_SESSION_SECRET => {
                return Err(ConfigError::DevSecretInProduction);
            }
            Some(secret) => secret,
            None if production => return Err(ConfigError::MissingSessionSecret),
            None => {
                tracing::warn!("SESSION_SECRET not set, using insecure development secret");
                DEV_SESSION_SECRET.to_owned()
            }
        };

        let port = parse_or("PORT", lookup("PORT"), DEFAULT_PORT)?;
        let api_base_url = normalize_base_url(lookup("API_BASE_URL").as_deref().unwrap_or(DEFAULT_API_BASE_URL));
        let public_api_base_url = lookup("PUBLIC_API_BASE_URL")
            .map_or_else(|| api_base_url.clone(), |url| normalize_base_url(&url));

        let secure_cookies = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key: "COOKIE_SECURE", value: raw })?,
            None => production,
        };

        let refresh_timeout_secs =
            parse_or("REFRESH_TIMEOUT_SECS", lookup("REFRESH_TIMEOUT_SECS"), DEFAULT_REFRESH_TIMEOUT_SECS)?;
        let api_timeout_secs = parse_or("API_TIMEOUT_SECS", lookup("API_TIMEOUT_SECS"), DEFAULT_API_TIMEOUT_SECS)?;
        let static_dir = lookup("STATIC_DIR").map_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR), PathBuf::from);

        Ok(Self {
            port,
            api_base_url,
            public_api_base_url,
            session_secret,
            production,
            secure_cookies,
            refresh_timeout: Duration::from_secs(refresh_timeout_secs),
            api_timeout: Duration::from_secs(api_timeout_secs),
            static_dir,
        })
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match raw {
        Some(value) => value.trim().parse::<T>().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
