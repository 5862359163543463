use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;

pub mod role;
pub mod token;
pub mod transport;

pub use role::{InvalidRoleValue, Role, RoleGate};
pub use token::{Claims, TokenCodec};
pub use transport::{AUTH_COOKIE, SessionTransport};

/// Principal
///
/// The resolved identity of an authenticated request, exactly as it was encoded in the
/// token. The role is the one baked in at issuance, not the currently stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

/// Principal Extractor
///
/// Reads the principal bound by `authenticate`. Handlers take `Principal` as an argument
/// to learn who is calling; when no principal was bound (the route is not behind the
/// authentication layer) the request is rejected with 401 `Not authenticated`.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or(ApiError::NotAuthenticated)
    }
}

/// authenticate
///
/// Authentication gate. Extracts the bearer token, verifies it, and binds the resulting
/// `Principal` to the request for the rest of the pipeline.
///
/// Rejections:
/// - no usable `Authorization: Bearer` header: 401 `Authentication required`
/// - any verification failure (malformed, forged, expired): 401 `Token is not valid`.
///   The specific cause is only visible in server logs.
///
/// No store access happens here.
pub async fn authenticate(
    State(codec): State<Arc<TokenCodec>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token =
        SessionTransport::extract(request.headers()).ok_or(ApiError::AuthenticationRequired)?;

    let principal = codec
        .verify(&token, Utc::now())
        .map_err(ApiError::InvalidToken)?;

    tracing::debug!(user_id = %principal.id, role = %principal.role, "request authenticated");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// authorize
///
/// Role gate. Must be layered inside `authenticate`; runs `RoleGate::check` against the
/// bound principal.
pub async fn authorize(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(err) = gate.check(request.extensions().get::<Principal>()) {
        tracing::debug!(reason = %err, "request not authorized");
        return Err(err.into());
    }

    Ok(next.run(request).await)
}
