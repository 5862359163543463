use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

use crate::config::AppConfig;

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

const BEARER_PREFIX: &str = "Bearer ";

/// SessionTransport
///
/// Moves session tokens between server and client. Outbound, the token is set as an
/// `HttpOnly`, `SameSite=Strict` cookie (plus `Secure` in production); inbound, it is read
/// from the `Authorization: Bearer` header.
///
/// Clearing the cookie is client-side hygiene only: the token itself stays valid until it expires.
#[derive(Debug, Clone)]
pub struct SessionTransport {
    secure: bool,
    cookie_lifetime: Duration,
}

impl SessionTransport {
    pub fn new(secure: bool, cookie_lifetime: Duration) -> Self {
        Self {
            secure,
            cookie_lifetime,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.env.is_production(), config.cookie_lifetime())
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((AUTH_COOKIE, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .build()
    }

    /// attach
    ///
    /// Sets the session cookie with an absolute `Max-Age` equal to the configured cookie lifetime.
    pub fn attach(&self, jar: CookieJar, token: &str) -> CookieJar {
        let mut cookie = self.cookie(token.to_string());
        cookie.set_max_age(self.cookie_lifetime);
        jar.add(cookie)
    }

    /// clear
    ///
    /// Overwrites the session cookie with an empty value that has already expired.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = self.cookie(String::new());
        cookie.set_max_age(Duration::ZERO);
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        jar.add(cookie)
    }

    /// extract
    ///
    /// Reads `Authorization: Bearer <token>`. Returns `None` when the header is absent,
    /// not valid text, lacks the `Bearer ` prefix, or carries an empty token.
    pub fn extract(headers: &HeaderMap) -> Option<String> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = value.strip_prefix(BEARER_PREFIX)?.trim();

        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}
