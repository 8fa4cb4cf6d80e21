use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Input rejected by one of the format rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    InvalidFormat(&'static str),
    #[error("{0}")]
    WeakPassword(&'static str),
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Missing email or password")]
    MissingCredentials,
    #[error("{0}")]
    MalformedBody(String),
    #[error("You must agree to the terms and conditions")]
    TermsNotAccepted,
    #[error("Username already exists")]
    DuplicateUsername,
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("storage unavailable")]
    StorageUnavailable,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AccountError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => AccountError::StorageUnavailable,
            sqlx::Error::Database(db) if db.message().contains("database is locked") => {
                AccountError::StorageUnavailable
            }
            _ => AccountError::Internal(format!("database error: {}", e)),
        }
    }
}

impl From<JsonRejection> for AccountError {
    fn from(rejection: JsonRejection) -> Self {
        AccountError::MalformedBody(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl AccountError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccountError::Validation(_)
            | AccountError::MissingField(_)
            | AccountError::MissingCredentials
            | AccountError::MalformedBody(_)
            | AccountError::TermsNotAccepted => StatusCode::BAD_REQUEST,
            AccountError::DuplicateUsername | AccountError::DuplicateEmail => {
                StatusCode::CONFLICT
            }
            AccountError::UserNotFound | AccountError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AccountError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client.
    ///
    /// Unknown email and wrong password share one message so callers cannot tell
    /// which addresses are registered.
    pub fn public_message(&self) -> String {
        match self {
            AccountError::UserNotFound | AccountError::InvalidCredentials => {
                "Invalid email or password".into()
            }
            AccountError::StorageUnavailable => "Service temporarily unavailable".into(),
            AccountError::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        if let AccountError::Internal(detail) = &self {
            error!(error = %detail, "request failed");
        }
        let message = self.public_message();
        let body = ErrorBody { error: &message };
        (self.status_code(), Json(body)).into_response()
    }
}
