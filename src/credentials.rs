use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::{
    auth::Role,
    error::ApiError,
    models::{NewUser, SignupRequest, User},
    repository::RepositoryState,
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

// Hashed once, on the first login attempt for an unknown email.
static PLACEHOLDER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("placeholder-for-unknown-accounts").ok());

/// CredentialStore
///
/// Registers accounts and checks email/password pairs. Passwords are only ever held as
/// Argon2id hashes; hashing runs on the blocking pool so it does not stall the runtime.
#[derive(Clone)]
pub struct CredentialStore {
    repo: RepositoryState,
}

impl CredentialStore {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// register
    ///
    /// Creates a baseline-role account. Rejects invalid input with 400 and an already
    /// registered email with 400 `User already exists`.
    pub async fn register(&self, request: SignupRequest) -> Result<User, ApiError> {
        let name = validate_name(&request.name)?;
        let email = normalize_email(&request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(ApiError::UserExists);
        }

        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| ApiError::Internal(format!("hashing task failed: {err}")))??;

        let user = self
            .repo
            .create_user(NewUser {
                name,
                email,
                password_hash,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "account registered");
        Ok(user)
    }

    /// verify
    ///
    /// Unknown email and wrong password are indistinguishable: both are 401 `Invalid credentials`.
    /// An unknown email is still checked against a placeholder hash so both cases cost one
    /// Argon2 verification.
    pub async fn verify(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let email = email.trim().to_lowercase();
        let user = self.repo.find_by_email(&email).await?;

        let password = password.to_string();
        let stored = user.as_ref().map(|user| user.password_hash.clone());
        let matches = tokio::task::spawn_blocking(move || match stored {
            Some(stored) => verify_password(&password, &stored),
            None => {
                if let Some(placeholder) = PLACEHOLDER_HASH.as_deref() {
                    verify_password(&password, placeholder);
                }
                false
            }
        })
        .await
        .map_err(|err| ApiError::Internal(format!("hashing task failed: {err}")))?;

        match user {
            Some(user) if matches => Ok(user),
            Some(user) => {
                tracing::debug!(user_id = %user.id, "password mismatch");
                Err(ApiError::InvalidCredentials)
            }
            None => Err(ApiError::InvalidCredentials),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("password hashing failed: {err}")))
}

/// A stored hash that cannot be parsed counts as a mismatch.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::error!(error = %err, "stored password hash is unreadable");
            false
        }
    }
}

pub fn validate_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    Ok(name.to_string())
}

/// Trims and lowercases; requires a single `@` with text on both sides and no whitespace.
pub fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(ApiError::Validation("Please provide a valid email".to_string()))
    }
}
