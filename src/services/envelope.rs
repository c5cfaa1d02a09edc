//! Signed session envelope.
//!
//! FORMAT
//! ======
//! Compact HS256 token (`header.payload.signature`). The payload is the
//! serialized `Session` plus `iat`/`exp` in unix seconds. Expiry is absolute:
//! `exp = iat + ttl`, and re-sealing always starts a fresh window.
//!
//! ERROR HANDLING
//! ==============
//! `open` distinguishes expired, tampered and malformed envelopes so callers
//! can log the reason, but every variant means "not authenticated".

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::session::Session;

/// Fixed lifetime of a session envelope and its cookie.
pub const SESSION_TTL: Duration = Duration::days(7);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("session envelope expired")]
    Expired,
    #[error("session envelope signature invalid")]
    Tampered,
    #[error("session envelope malformed: {0}")]
    Malformed(String),
    #[error("session envelope signing failed: {0}")]
    Signing(String),
}

impl EnvelopeError {
    /// Short label used as a structured log field.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Tampered => "tampered",
            Self::Malformed(_) => "malformed",
            Self::Signing(_) => "signing",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for EnvelopeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::Tampered,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Decoded envelope payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub session: Session,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies session envelopes with a server-held symmetric key.
#[derive(Clone)]
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    secure_cookies: bool,
}

impl SessionCodec {
    #[must_use]
    pub fn new(secret: &[u8], secure_cookies: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            secure_cookies,
        }
    }

    /// Whether cookies carrying this codec's envelopes get the `Secure` flag.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    /// Seal a session issued at `issued_at`. Returns the token and its absolute expiry.
    pub fn seal(&self, session: &Session, issued_at: OffsetDateTime) -> Result<(String, OffsetDateTime), EnvelopeError> {
        let expires_at = issued_at + SESSION_TTL;
        let claims = SessionClaims {
            session: session.clone(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| EnvelopeError::Signing(e.to_string()))?;
        Ok((token, expires_at))
    }

    /// Verify signature and expiry, then decode the payload.
    pub fn open(&self, token: &str) -> Result<SessionClaims, EnvelopeError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }

    /// Verify signature and expiry without trusting the payload shape.
    pub fn verify(&self, token: &str) -> Result<(), EnvelopeError> {
        jsonwebtoken::decode::<IgnoredAny>(token, &self.decoding, &self.validation)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
