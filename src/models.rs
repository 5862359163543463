use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;

// --- Core Records ---

/// User
///
/// The canonical account record as held by the repository, including the password hash.
/// Never serialized directly; responses go through `UserView`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Unique, stored lowercased.
    pub email: String,
    // Argon2id PHC string.
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Input to `Repository::create_user`. The repository assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// UserView
///
/// The public shape of an account. Field names follow the web client (`_id`, camelCase timestamps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

// --- Request Payloads ---

/// SignupRequest
///
/// Input for POST /api/auth/signup. There is deliberately no role field: new accounts are
/// always created with the baseline role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// UpdateProfileRequest
///
/// Partial update for PUT /api/user/profile. Absent fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// UpdateRoleRequest
///
/// Input for PUT /api/admin/users/{id}/role. The role is kept as raw JSON and checked
/// against the role enumeration by the handler; a missing role, `null`, a number or any
/// other non-member is rejected there as `Invalid role`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub role: serde_json::Value,
}

// --- Responses ---

/// AuthResponse
///
/// Returned by signup and login. `token` is the bearer value the client sends back.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UsersResponse {
    pub users: Vec<UserView>,
}

/// UserMessageResponse
///
/// Returned by mutations that echo the updated account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserMessageResponse {
    pub message: String,
    pub user: UserView,
}

/// MessageResponse
///
/// Plain `{ message }` body, used for confirmations and for every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
