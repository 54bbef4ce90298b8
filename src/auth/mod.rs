pub mod password;
pub mod roles;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

pub use roles::{require_role, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub tenant: String,
    pub database: String,
    pub user: String,
    pub role: Role,
    pub user_id: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(tenant: String, database: String, user: String, role: Role, user_id: Uuid) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            tenant,
            database,
            user,
            role,
            user_id,
            exp,
            iat: now.timestamp(),
        }
    }

    /// Seconds until the token expires, as reported to clients
    pub fn expires_in(&self) -> i64 {
        (self.exp - self.iat).max(0)
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    generate_jwt_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn generate_jwt_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate JWT token and extract claims
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    validate_jwt_with_secret(token, &config::config().security.jwt_secret)
}

pub fn validate_jwt_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims::new(
            "acme-security".to_string(),
            "tenant_0123456789abcdef".to_string(),
            "ops@acme.test".to_string(),
            Role::Manager,
            Uuid::new_v4(),
        )
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let claims = claims();
        let token = generate_jwt_with_secret(&claims, "unit-test-secret").unwrap();
        let decoded = validate_jwt_with_secret(&token, "unit-test-secret").unwrap();
        assert_eq!(decoded.user_id, claims.user_id);
        assert_eq!(decoded.role, Role::Manager);
        assert_eq!(decoded.database, "tenant_0123456789abcdef");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_with_secret(&claims(), "unit-test-secret").unwrap();
        assert!(matches!(
            validate_jwt_with_secret(&token, "another-secret"),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = claims();
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = generate_jwt_with_secret(&claims, "unit-test-secret").unwrap();
        assert!(validate_jwt_with_secret(&token, "unit-test-secret").is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(generate_jwt_with_secret(&claims(), ""), Err(JwtError::InvalidSecret)));
    }
}
