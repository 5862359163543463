use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing segregated by gate (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{Principal, Role, RoleGate, SessionTransport, TokenCodec};
pub use config::AppConfig;
pub use credentials::CredentialStore;
pub use error::{ApiError, ConfigError};
pub use extract::ApiJson;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler decorated with `#[utoipa::path]`,
/// served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::signup, handlers::login, handlers::logout,
        handlers::get_current_user, handlers::get_profile, handlers::update_profile,
        handlers::list_users, handlers::get_user_by_id, handlers::update_user_role,
        handlers::delete_user
    ),
    components(
        schemas(
            models::UserView, models::SignupRequest, models::LoginRequest,
            models::UpdateProfileRequest, models::UpdateRoleRequest, models::AuthResponse,
            models::UserResponse, models::UsersResponse, models::UserMessageResponse,
            models::MessageResponse, models::HealthResponse, auth::Role,
        )
    ),
    tags(
        (name = "account-portal", description = "Account signup, login and role-gated administration")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container for the services every request may need. Everything in it
/// is immutable after startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Account persistence.
    pub repo: RepositoryState,
    /// Signup and email/password verification on top of `repo`.
    pub credentials: CredentialStore,
    /// Token issuance and verification, keyed by the configured secret.
    pub tokens: Arc<TokenCodec>,
    /// Session cookie handling.
    pub transport: SessionTransport,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the token codec and transport from `config`.
    ///
    /// # Errors
    /// Fails if the signing secret or lifetime in `config` is unusable.
    pub fn new(config: AppConfig, repo: RepositoryState) -> Result<Self, ConfigError> {
        let tokens = TokenCodec::new(&config.jwt_secret, config.token_lifetime)?;
        Ok(Self {
            credentials: CredentialStore::new(repo.clone()),
            repo,
            tokens: Arc::new(tokens),
            transport: SessionTransport::from_config(&config),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(app_state: &AppState) -> Arc<TokenCodec> {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree and its layers:
/// - public routes, no gate;
/// - authenticated routes behind `auth::authenticate` (profile routes add the baseline gate);
/// - `/api/admin` behind `auth::authenticate` and then the admin-only gate.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS: the configured client origin only, with credentials.
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    match state.config.client_url.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(
            client_url = %state.config.client_url,
            "CLIENT_URL is not a valid origin; cross-origin requests will be refused"
        ),
    }

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routes
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::authenticate,
            )),
        )
        // Layers added later run first: authenticate, then the admin gate inside admin_routes.
        .nest(
            "/api/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::authenticate,
            )),
        )
        .with_state(state);

    // 3. Observability and correlation
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with the `x-request-id` so every log line of the request
/// can be correlated. Headers other than the request id are not recorded.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
