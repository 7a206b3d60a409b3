//! Request-scoped caller identity.
//!
//! [`authenticate`] runs once per request on every protected route and
//! attaches the verified [`Identity`] to that request's extensions. Handlers
//! ask for it by type through [`CurrentUser`]; routes that must stay
//! reachable without credentials (login, registration) simply never do.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::{HeaderValue, header};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::token::{TokenCodec, VerificationError};

const SCHEME: &str = "Token";

/// Verified caller, immutable for the lifetime of one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

/// Extract `<token>` out of `Token <token>`.
fn parse_authorization(value: Option<&HeaderValue>) -> Result<&str, VerificationError> {
    let value = value
        .ok_or(VerificationError::MissingHeader)?
        .to_str()
        .map_err(|_| VerificationError::MalformedToken)?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or(VerificationError::MalformedToken)?;

    if !scheme.eq_ignore_ascii_case(SCHEME) || token.trim().is_empty() {
        return Err(VerificationError::MalformedToken);
    }

    Ok(token.trim())
}

/// Middleware verifying `Authorization: Token <jwt>`.
pub async fn authenticate(
    State(codec): State<TokenCodec>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let header = req.headers().get(header::AUTHORIZATION);
    let identity = match parse_authorization(header).and_then(|token| codec.verify(token)) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(error = %err, "request refused");
            metrics::counter!("auth_failures_total", "reason" => "token").increment(1);
            return Err(err.into());
        },
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Identity of the caller of a protected route.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ServerError::Token(VerificationError::MissingHeader))
    }
}
