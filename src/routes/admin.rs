use crate::{
    AppState,
    auth::{RoleGate, authorize},
    handlers,
};
use axum::{
    Router, middleware,
    routing::{get, put},
};

/// Admin Router Module
///
/// User management, nested under `/api/admin`. The whole router sits behind the
/// admin-only role gate; `create_router` puts the authentication layer in front of it.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/users
        .route("/users", get(handlers::list_users))
        // GET/DELETE /api/admin/users/{id}
        .route(
            "/users/{id}",
            get(handlers::get_user_by_id).delete(handlers::delete_user),
        )
        // PUT /api/admin/users/{id}/role
        // Only roles from the enumeration are accepted.
        .route("/users/{id}/role", put(handlers::update_user_role))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::admin_only(),
            authorize,
        ))
}
