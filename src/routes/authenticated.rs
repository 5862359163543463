use crate::{
    AppState,
    auth::{RoleGate, authorize},
    handlers,
};
use axum::{Router, middleware, routing::get};

/// Authenticated Router Module
///
/// Every route here expects `create_router` to wrap it in the authentication layer, which
/// binds the caller's `Principal`.
///
/// `/api/auth/me` only needs a valid token. The profile routes additionally pass the
/// baseline role gate, which admits users and administrators alike.
pub fn authenticated_routes() -> Router<AppState> {
    let profile = Router::new()
        // GET/PUT /api/user/profile
        .route(
            "/api/user/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route_layer(middleware::from_fn_with_state(
            RoleGate::baseline(),
            authorize,
        ));

    Router::new()
        // GET /api/auth/me
        .route("/api/auth/me", get(handlers::get_current_user))
        .merge(profile)
}
