use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::Role,
    error::RepositoryError,
    models::{NewUser, UpdateProfileRequest, User},
};

/// Repository Trait
///
/// The persistence contract for accounts. Handlers and the credential store only see this
/// trait, so the Postgres implementation and the in-memory one are interchangeable.
///
/// Emails are compared exactly; callers normalize them before they get here.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Fails with `DuplicateEmail` if the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    /// Newest accounts first.
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;
    async fn update_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileRequest,
    ) -> Result<Option<User>, RepositoryError>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepositoryError>;
    /// Returns false when no such account existed.
    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The shared handle stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// Raw `users` row. The role column is text and is parsed back into `Role`.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|err| RepositoryError::Corrupt(format!("user {}: {}", row.id, err)))?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => RepositoryError::DuplicateEmail,
        other => RepositoryError::Database(other),
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, RepositoryError> {
    row.map(User::try_from).transpose()
}

/// PostgresRepository
///
/// `Repository` backed by the `users` table (see `migrations/0001_create_users.sql`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `users` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(include_str!("../migrations/0001_create_users.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.code())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;

        User::try_from(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        into_user(row)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        into_user(row)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// Partial update: COALESCE keeps the stored value for absent fields.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileRequest,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?;

        into_user(row)
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role.code())
            .fetch_optional(&self.pool)
            .await?;

        into_user(row)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// --- In-memory ---

/// InMemoryRepository
///
/// Process-local `Repository`, used when no database is configured in local mode and by the
/// test suites. Records are kept in insertion order.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.iter().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.email == email).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|user| user.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.iter().rev().cloned().collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: UpdateProfileRequest,
    ) -> Result<Option<User>, RepositoryError> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if users.iter().any(|other| other.id != id && &other.email == email) {
                return Err(RepositoryError::DuplicateEmail);
            }
        }

        let Some(user) = users.iter_mut().find(|user| user.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepositoryError> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|user| user.id == id) else {
            return Ok(None);
        };
        user.role = role;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|user| user.id != id);
        Ok(users.len() != before)
    }
}
