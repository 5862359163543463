use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token. Signup and login are where sessions begin; logout only
/// clears the cookie, so it does not require a valid token either.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // POST /api/auth/signup
        // Creates a baseline-role account and returns a token plus the session cookie.
        .route("/api/auth/signup", post(handlers::signup))
        // POST /api/auth/login
        .route("/api/auth/login", post(handlers::login))
        // POST /api/auth/logout
        .route("/api/auth/logout", post(handlers::logout))
}
