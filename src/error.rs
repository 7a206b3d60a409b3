//! Error handler for conduit.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::crypto::CryptoError;
use crate::token::VerificationError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Coarse error families, each mapped to one HTTP status family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Auth,
    NotFound,
    Internal,
}

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Path(#[from] PathRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error("{field} has already been taken")]
    Conflict { field: &'static str },

    #[error(transparent)]
    Token(#[from] VerificationError),

    #[error("email or password is invalid")]
    InvalidCredentials,

    #[error("cannot follow yourself")]
    SelfFollow,

    #[error("only the author can modify this resource")]
    Forbidden,

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("internal server error, {details}")]
    Internal { details: String },
}

impl ServerError {
    /// Build an [`ServerError::Internal`] from any displayable failure.
    pub fn internal(details: impl ToString) -> Self {
        Self::Internal {
            details: details.to_string(),
        }
    }

    /// Family of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::Path(_)
            | ServerError::Query(_) => ErrorKind::Validation,
            ServerError::Conflict { .. } => ErrorKind::Conflict,
            ServerError::Token(_)
            | ServerError::InvalidCredentials
            | ServerError::SelfFollow
            | ServerError::Forbidden => ErrorKind::Auth,
            ServerError::NotFound { .. } => ErrorKind::NotFound,
            ServerError::Sql(_) | ServerError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP status of the error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_)
            | ServerError::Json(_)
            | ServerError::Path(_)
            | ServerError::Query(_)
            | ServerError::Conflict { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Token(_) => StatusCode::UNAUTHORIZED,
            ServerError::InvalidCredentials | ServerError::SelfFollow | ServerError::Forbidden => {
                StatusCode::FORBIDDEN
            },
            ServerError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServerError::Sql(_) | ServerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CryptoError> for ServerError {
    fn from(err: CryptoError) -> Self {
        ServerError::internal(err)
    }
}

/// Field-keyed error body: `{"errors": {"email": ["is invalid"]}}`.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ResponseError {
    /// Add one detail to `field`.
    pub fn push(mut self, field: impl Into<String>, detail: impl Into<String>) -> Self {
        self.errors.entry(field.into()).or_default().push(detail.into());
        self
    }

    /// Automatically add validation errors, nested ones included.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        parse_validation_errors(errors, &mut self.errors);
        self
    }
}

fn parse_validation_errors(errors: &ValidationErrors, out: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(issues) => out
                .entry(field.to_string())
                .or_default()
                .extend(issues.iter().map(|issue| issue.to_string())),
            ValidationErrorsKind::Struct(nested) => parse_validation_errors(nested, out),
            ValidationErrorsKind::List(items) => items
                .values()
                .for_each(|nested| parse_validation_errors(nested, out)),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = match &self {
            ServerError::Validation(validation_errors) => {
                ResponseError::default().errors(validation_errors)
            },
            ServerError::Json(rejection) => ResponseError::default().push("body", rejection.body_text()),
            ServerError::Path(rejection) => ResponseError::default().push("path", rejection.body_text()),
            ServerError::Query(rejection) => ResponseError::default().push("query", rejection.body_text()),
            ServerError::Conflict { field } => {
                ResponseError::default().push(*field, "has already been taken")
            },
            ServerError::Token(err) => ResponseError::default().push("token", err.to_string()),
            ServerError::InvalidCredentials => {
                ResponseError::default().push("email or password", "is invalid")
            },
            ServerError::SelfFollow => ResponseError::default().push("user", "cannot follow yourself"),
            ServerError::Forbidden => ResponseError::default().push("user", "is not the author"),
            ServerError::NotFound { resource } => ResponseError::default().push(*resource, "not found"),
            ServerError::Sql(err) => {
                tracing::error!(%err, "server returned 500 status");
                ResponseError::default().push("internal", "error")
            },
            ServerError::Internal { details } => {
                tracing::error!(%details, "server returned 500 status");
                ResponseError::default().push("internal", "error")
            },
        };

        (self.status(), Json(body)).into_response()
    }
}
