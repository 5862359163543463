use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{Principal, Role},
    credentials::{normalize_email, validate_name},
    error::ApiError,
    extract::ApiJson,
    models::{
        AuthResponse, HealthResponse, LoginRequest, MessageResponse, SignupRequest,
        UpdateProfileRequest, UpdateRoleRequest, User, UserMessageResponse, UserResponse,
        UserView, UsersResponse,
    },
};

// --- Helpers ---

/// Issues a token for `user`, sets the session cookie and builds the response body.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
    message: &str,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let token = state
        .tokens
        .issue(user.id, user.role, Utc::now())
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let jar = state.transport.attach(jar, &token);
    Ok((
        jar,
        Json(AuthResponse {
            token,
            user: UserView::from(user),
            message: message.to_string(),
        }),
    ))
}

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidUserId)
}

// --- Public ---

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// signup
///
/// [Public Route] Registers a baseline-role account and starts a session for it.
/// The token is returned in the body and set as the `auth_token` cookie.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input or email taken", body = MessageResponse)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let user = state.credentials.register(payload).await?;
    let (jar, body) = start_session(&state, jar, &user, "User registered successfully")?;
    Ok((StatusCode::CREATED, jar, body))
}

/// login
///
/// [Public Route] Exchanges an email/password pair for a fresh token. The role in the
/// token is the role stored at this moment.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let user = state
        .credentials
        .verify(&payload.email, &payload.password)
        .await?;

    tracing::info!(user_id = %user.id, "login succeeded");
    start_session(&state, jar, &user, "Login successful")
}

/// logout
///
/// [Public Route] Clears the session cookie.
///
/// *Note*: there is no server-side revocation. A copy of the token stays valid until its expiry.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Cookie cleared", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        state.transport.clear(jar),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

// --- Authenticated ---

/// get_current_user
///
/// [Authenticated Route] Returns the stored account behind the token. 404 if the
/// account has been deleted since the token was issued.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = MessageResponse),
        (status = 404, description = "Account no longer exists", body = MessageResponse)
    )
)]
pub async fn get_current_user(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .repo
        .get_user(principal.id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(UserResponse { user: user.into() }))
}

/// get_profile
///
/// [Baseline Route] Same payload as `/api/auth/me`, behind the baseline role gate.
#[utoipa::path(
    get,
    path = "/api/user/profile",
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 403, description = "Role not allowed", body = MessageResponse)
    )
)]
pub async fn get_profile(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    get_current_user(principal, State(state)).await
}

/// update_profile
///
/// [Baseline Route] Updates the caller's own name and/or email. The role cannot be changed here.
#[utoipa::path(
    put,
    path = "/api/user/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserMessageResponse),
        (status = 400, description = "Invalid input or email taken", body = MessageResponse)
    )
)]
pub async fn update_profile(
    principal: Principal,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserMessageResponse>, ApiError> {
    let changes = UpdateProfileRequest {
        name: payload.name.as_deref().map(validate_name).transpose()?,
        email: payload.email.as_deref().map(normalize_email).transpose()?,
    };

    let user = state
        .repo
        .update_profile(principal.id, changes)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(UserMessageResponse {
        message: "Profile updated successfully".to_string(),
        user: user.into(),
    }))
}

// --- Admin ---

/// list_users
///
/// [Admin Route] Every account, newest first, without password hashes.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users", body = UsersResponse),
        (status = 403, description = "Not an administrator", body = MessageResponse)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.repo.list_users().await?;
    Ok(Json(UsersResponse {
        users: users.iter().map(UserView::from).collect(),
    }))
}

/// get_user_by_id
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserResponse),
        (status = 400, description = "Malformed id", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_user_id(&id)?;
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(UserResponse { user: user.into() }))
}

/// update_user_role
///
/// [Admin Route] Changes an account's stored role.
///
/// *Validation*: the requested role is parsed against the role enumeration before anything
/// else; anything that is not one of the role codes (including non-strings and a missing
/// field) is rejected with 400 `Invalid role` and nothing is persisted.
/// Tokens already issued to the account keep their old role until the user logs in again.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserMessageResponse),
        (status = 400, description = "Invalid role or id", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn update_user_role(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateRoleRequest>,
) -> Result<Json<UserMessageResponse>, ApiError> {
    let role = payload
        .role
        .as_str()
        .and_then(|code| code.parse::<Role>().ok())
        .ok_or_else(|| {
            tracing::warn!(admin_id = %principal.id, requested = %payload.role, "rejected unknown role");
            ApiError::InvalidRole
        })?;
    let id = parse_user_id(&id)?;

    let user = state
        .repo
        .update_role(id, role)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    tracing::info!(admin_id = %principal.id, user_id = %user.id, %role, "role updated");
    Ok(Json(UserMessageResponse {
        message: "User role updated successfully".to_string(),
        user: user.into(),
    }))
}

/// delete_user
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn delete_user(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_user_id(&id)?;
    if !state.repo.delete_user(id).await? {
        return Err(ApiError::UserNotFound);
    }

    tracing::info!(admin_id = %principal.id, user_id = %id, "user deleted");
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}
