use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, TokenError};

use super::{Principal, Role};

/// Claims
///
/// The payload signed into every session token. Timestamps are Unix seconds, so token
/// times have one-second resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id.
    pub sub: Uuid,
    /// Role at the moment of issuance. Later role changes are not reflected until a new token is issued.
    pub role: Role,
    /// Issued At (iat).
    pub iat: i64,
    /// Expiration Time (exp). The token is rejected from this instant onwards.
    pub exp: i64,
}

/// TokenCodec
///
/// Issues and verifies HS256 JSON Web Tokens. The MAC covers the full header and payload,
/// so no byte of either can change without the signature failing.
///
/// Verification is stateless: the principal comes straight out of the claims, with no
/// store round-trip. The secret and lifetime are fixed at construction.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenCodec {
    /// # Errors
    /// `MissingSecret` for an empty secret, `InvalidLifetime` for a non-positive lifetime.
    pub fn new(secret: &str, lifetime: Duration) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if lifetime <= Duration::zero() {
            return Err(ConfigError::InvalidLifetime(lifetime.to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify`, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// issue
    ///
    /// Signs `{id, role, iat = now, exp = now + lifetime}`. Claims hold whole seconds:
    /// `iat` is rounded down and `exp` up, so the token is valid for at least `lifetime`
    /// after `now`, whatever its sub-second part.
    pub fn issue(
        &self,
        principal_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| TokenError::Signing("expiry is out of range".to_string()))?;
        let claims = Claims {
            sub: principal_id,
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp() + i64::from(expires_at.timestamp_subsec_nanos() > 0),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// verify
    ///
    /// Returns the principal exactly as it was encoded.
    ///
    /// # Errors
    /// - `Invalid` when the signature does not match (tampered payload, foreign secret).
    /// - `Expired` when `now >= exp`.
    /// - `Malformed` for anything that cannot be decoded as one of our tokens.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::InvalidSignature => TokenError::Invalid,
                _ => TokenError::Malformed,
            }
        })?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(Principal {
            id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

    const SECRET: &str = "test-secret-value-1234567890";
    const USER_ID: Uuid = Uuid::from_u128(1);

    fn issued_at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Duration::days(7)).unwrap()
    }

    fn rewrite_payload(token: &str, edit: impl FnOnce(&mut serde_json::Value)) -> String {
        let parts: Vec<&str> = token.split('.').collect();
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let mut claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        edit(&mut claims);
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("{}.{}.{}", parts[0], forged, parts[2])
    }

    #[test]
    fn test_new_rejects_missing_secret() {
        assert!(matches!(
            TokenCodec::new("", Duration::days(7)),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn test_new_rejects_non_positive_lifetime() {
        assert!(matches!(
            TokenCodec::new(SECRET, Duration::zero()),
            Err(ConfigError::InvalidLifetime(_))
        ));
    }

    #[test]
    fn test_round_trip_within_lifetime() {
        let codec = codec();
        let t = issued_at();
        for role in Role::ALL {
            let token = codec.issue(USER_ID, role, t).unwrap();
            for later in [
                t,
                t + Duration::seconds(1),
                t + Duration::days(3),
                t + codec.lifetime() - Duration::seconds(1),
            ] {
                let principal = codec.verify(&token, later).unwrap();
                assert_eq!(principal, Principal { id: USER_ID, role });
            }
        }
    }

    #[test]
    fn test_claims_carry_issue_and_expiry() {
        let codec = codec();
        let token = codec.issue(USER_ID, Role::Admin, issued_at()).unwrap();
        let payload = URL_SAFE_NO_PAD
            .decode(token.split('.').nth(1).unwrap())
            .unwrap();
        let claims: Claims = serde_json::from_slice(&payload).unwrap();
        assert_eq!(claims.sub, USER_ID);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_000_000 + 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_sub_second_issue_keeps_full_lifetime() {
        let codec = TokenCodec::new(SECRET, Duration::seconds(10)).unwrap();
        let t = issued_at() + Duration::milliseconds(700);
        let token = codec.issue(USER_ID, Role::User, t).unwrap();

        for later in [
            t,
            t + Duration::milliseconds(9_500),
            t + Duration::milliseconds(9_999),
        ] {
            assert!(codec.verify(&token, later).is_ok(), "rejected at {later}");
        }

        // exp is the first whole second at or after t + lifetime.
        let exp = DateTime::from_timestamp(1_700_000_011, 0).unwrap();
        assert_eq!(codec.verify(&token, exp), Err(TokenError::Expired));
    }

    #[test]
    fn test_expired_exactly_at_boundary() {
        let codec = codec();
        let t = issued_at();
        let token = codec.issue(USER_ID, Role::User, t).unwrap();
        let expires_at = t + codec.lifetime();

        assert_eq!(codec.verify(&token, expires_at), Err(TokenError::Expired));
        assert_eq!(
            codec.verify(&token, expires_at + Duration::seconds(1)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            codec.verify(&token, expires_at + Duration::days(365)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_foreign_secret_is_invalid() {
        let other = TokenCodec::new("some-other-secret", Duration::days(7)).unwrap();
        let token = other.issue(USER_ID, Role::User, issued_at()).unwrap();
        assert_eq!(codec().verify(&token, issued_at()), Err(TokenError::Invalid));
    }

    #[test]
    fn test_role_escalation_in_payload_is_invalid() {
        let codec = codec();
        let token = codec.issue(USER_ID, Role::User, issued_at()).unwrap();
        let forged = rewrite_payload(&token, |claims| claims["role"] = "admin".into());
        assert_eq!(codec.verify(&forged, issued_at()), Err(TokenError::Invalid));
    }

    #[test]
    fn test_extended_expiry_in_payload_is_invalid() {
        let codec = codec();
        let t = issued_at();
        let token = codec.issue(USER_ID, Role::User, t).unwrap();
        let forged = rewrite_payload(&token, |claims| {
            claims["exp"] = (1_700_000_000_i64 + 365 * 24 * 60 * 60).into()
        });
        assert_eq!(
            codec.verify(&forged, t + Duration::days(30)),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_every_single_bit_flip_is_rejected() {
        let codec = codec();
        let t = issued_at();
        let token = codec.issue(USER_ID, Role::User, t).unwrap();
        let bytes = token.as_bytes();

        for index in 0..bytes.len() {
            // Bits 0..=6 keep the byte ASCII, so the mutated token is still a valid &str.
            for bit in 0..7 {
                let mut mutated = bytes.to_vec();
                mutated[index] ^= 1 << bit;
                let mutated = String::from_utf8(mutated).unwrap();

                let result = codec.verify(&mutated, t);
                assert!(
                    matches!(result, Err(TokenError::Invalid | TokenError::Malformed)),
                    "byte {index} bit {bit} produced {result:?}"
                );
            }
        }
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        for garbage in ["", "not-a-token", "a.b.c", "...", "eyJhbGciOiJIUzI1NiJ9"] {
            assert_eq!(
                codec.verify(garbage, issued_at()),
                Err(TokenError::Malformed),
                "{garbage:?}"
            );
        }
    }

    #[test]
    fn test_unexpected_algorithm_is_rejected() {
        let claims = Claims {
            sub: USER_ID,
            role: Role::Admin,
            iat: 1_700_000_000,
            exp: 1_700_000_000 + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(codec().verify(&token, issued_at()), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unknown_role_in_signed_claims_is_malformed() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({
                "sub": USER_ID,
                "role": "superuser",
                "iat": 1_700_000_000,
                "exp": 1_700_000_000 + 60,
            }),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(codec().verify(&token, issued_at()), Err(TokenError::Malformed));
    }
}
