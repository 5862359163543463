use std::env;

use chrono::Duration;

use crate::error::ConfigError;

const DEFAULT_TOKEN_LIFETIME: &str = "7d";
const DEFAULT_COOKIE_LIFETIME_DAYS: i64 = 7;
const DEFAULT_CLIENT_URL: &str = "http://localhost:3000";
const DEFAULT_PORT: u16 = 5000;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers and middleware via `FromRef`.
/// The token signing secret and lifetimes live here and are handed to `TokenCodec`
/// and `SessionTransport` when the application state is assembled.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the cookie `Secure` flag and log format.
    pub env: Env,
    // Postgres connection string. Absent in local mode means the in-memory store is used.
    pub db_url: Option<String>,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Absolute lifetime of an issued token.
    pub token_lifetime: Duration,
    // Lifetime of the `auth_token` cookie, in days.
    pub cookie_lifetime_days: i64,
    // The single origin allowed by CORS.
    pub client_url: String,
    pub port: u16,
}

/// Env
///
/// Defines the runtime context: local development or hardened production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Env {
    pub fn is_production(self) -> bool {
        self == Env::Production
    }
}

impl Default for AppConfig {
    /// Non-panicking configuration used by test scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            token_lifetime: Duration::days(7),
            cookie_lifetime_days: DEFAULT_COOKIE_LIFETIME_DAYS,
            client_url: DEFAULT_CLIENT_URL.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the process environment (after `.env` has been applied).
    ///
    /// # Errors
    /// Fails fast when `JWT_SECRET` is missing or empty, when a lifetime cannot be parsed,
    /// or when production is selected without a `DATABASE_URL`. The caller is expected to
    /// abort startup on any of these.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let token_lifetime = parse_lifetime(
            lookup("JWT_EXPIRES_IN")
                .as_deref()
                .unwrap_or(DEFAULT_TOKEN_LIFETIME),
        )?;

        let cookie_lifetime_days = match lookup("COOKIE_EXPIRES_IN") {
            Some(raw) => match raw.trim().parse::<i64>() {
                // Max-Age is sent in seconds, so the value must fit once converted.
                Ok(days) if days > 0 && days.checked_mul(SECONDS_PER_DAY).is_some() => days,
                _ => return Err(ConfigError::InvalidCookieLifetime(raw)),
            },
            None => DEFAULT_COOKIE_LIFETIME_DAYS,
        };

        let db_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if env.is_production() && db_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let port = lookup("PORT")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            env,
            db_url,
            jwt_secret,
            token_lifetime,
            cookie_lifetime_days,
            client_url: lookup("CLIENT_URL").unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string()),
            port,
        })
    }

    /// Cookie lifetime as a `time::Duration`, which is what the cookie builder expects.
    pub fn cookie_lifetime(&self) -> time::Duration {
        time::Duration::seconds(self.cookie_lifetime_days.saturating_mul(SECONDS_PER_DAY))
    }
}

/// parse_lifetime
///
/// Accepts `<n>` (seconds), `<n>s`, `<n>m`, `<n>h` or `<n>d`. Zero and negative values are rejected.
pub fn parse_lifetime(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidLifetime(raw.to_string());
    let trimmed = raw.trim();

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let value: i64 = digits.parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Err(invalid());
    }

    let seconds_per_unit = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    value
        .checked_mul(seconds_per_unit)
        .and_then(Duration::try_seconds)
        .ok_or_else(invalid)
}
