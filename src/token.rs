//! Manage session tokens.
//!
//! A token is a HS256 json web token asserting who the caller is. Nothing is
//! stored server-side: validity depends only on the signature and `exp`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AppState;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ServerError};
use crate::identity::Identity;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 10); // 10 hours.

/// Reasons a presented token is refused.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("missing 'Authorization' header")]
    MissingHeader,
    #[error("token is malformed")]
    MalformedToken,
    #[error("token signature does not match")]
    SignatureMismatch,
    #[error("token has expired")]
    Expired,
}

/// Pieces of information asserted on a token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    /// Identifies the time at which the token was issued.
    pub iat: u64,
    /// Identifies the expiration time on or after which the token must not
    /// be accepted for processing.
    pub exp: u64,
}

/// Sign and verify session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a new [`TokenCodec`] using the system clock.
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self::with_clock(secret, ttl, Arc::new(SystemClock))
    }

    /// Create a new [`TokenCodec`] with a custom time source.
    pub fn with_clock(secret: impl AsRef<[u8]>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            ttl,
            clock,
        }
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a new token for `identity`.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let now = self.clock.now();
        let claims = Claims {
            user_id: identity.user_id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(ServerError::internal)
    }

    /// Decode and check a token.
    pub fn verify(&self, token: &str) -> std::result::Result<Identity, VerificationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|err| match err.kind() {
                JwtErrorKind::InvalidSignature => VerificationError::SignatureMismatch,
                JwtErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::MalformedToken,
            })?
            .claims;

        Ok(Identity {
            user_id: claims.user_id,
            username: claims.username,
            email: claims.email,
        })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(state: &AppState) -> TokenCodec {
        state.token.clone()
    }
}
