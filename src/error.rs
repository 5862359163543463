use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::MessageResponse;

/// ConfigError
///
/// Startup-time failures. Any of these aborts the process before the listener is bound.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be defined in environment variables")]
    MissingSecret,

    #[error("invalid token lifetime: {0}")]
    InvalidLifetime(String),

    #[error("invalid cookie lifetime (days): {0}")]
    InvalidCookieLifetime(String),

    #[error("DATABASE_URL is required in production")]
    MissingDatabaseUrl,
}

/// TokenError
///
/// Verification-layer failures. These stay distinguishable in server-side diagnostics
/// but are collapsed into a single 401 before they reach the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The string could not be decoded as a token of the expected shape.
    #[error("malformed token")]
    Malformed,
    /// The signature does not match the payload (tampered, or signed with another secret).
    #[error("token signature is invalid")]
    Invalid,
    /// The absolute expiry has been reached.
    #[error("token has expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// AuthzError
///
/// Outcome of a failed `RoleGate::check`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// RepositoryError
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("email is already registered")]
    DuplicateEmail,

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// ApiError
///
/// The HTTP boundary error. Every variant renders as `{ "message": ... }` with its status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Token is not valid")]
    InvalidToken(#[source] TokenError),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Not authorized to access this resource")]
    NotAuthorized,

    #[error("Invalid role")]
    InvalidRole,

    #[error("Invalid user ID")]
    InvalidUserId,

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("Server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationRequired
            | ApiError::InvalidToken(_)
            | ApiError::NotAuthenticated
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotAuthorized => StatusCode::FORBIDDEN,
            ApiError::InvalidRole
            | ApiError::InvalidUserId
            | ApiError::UserExists
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::UserNotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotAuthenticated => ApiError::NotAuthenticated,
            AuthzError::NotAuthorized => ApiError::NotAuthorized,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => ApiError::UserExists,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            // Never echoes the detail to the client.
            ApiError::Internal(detail) => tracing::error!(%detail, "request failed"),
            ApiError::InvalidToken(kind) => tracing::debug!(reason = %kind, "token rejected"),
            _ => {}
        }

        let body = MessageResponse {
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
