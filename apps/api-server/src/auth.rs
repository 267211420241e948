//! OAuth2-password-flow JWT issuance and validation (spec §6), adapted from
//! the teacher's `JwtManager` shape: a single secret, a single lifetime, no
//! refresh-token concept (the spec's accounts surface is sessionless —
//! clients re-authenticate with credentials when a token expires).
//!
//! Account passwords are stored only as bcrypt hashes, never in cleartext.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
    #[error("token is invalid or expired")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hash(#[source] bcrypt::BcryptError),
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// JWT claims for a logged-in account (spec §6: `sub`, `tenant_id`,
/// `is_superuser`, `exp`). `is_superuser` lets a single account manage
/// every tenant (spec §9's `authenticate_superuser` path) without a
/// separate token shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant_id: String,
    pub is_superuser: bool,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    algorithm: Algorithm,
    lifetime_minutes: i64,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, algorithm: &str, lifetime_minutes: i64) -> Self {
        let algorithm = match algorithm {
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            _ => Algorithm::HS256,
        };
        JwtManager { secret: secret.into(), algorithm, lifetime_minutes }
    }

    pub fn issue(&self, account_id: &str, tenant_id: &str, is_superuser: bool) -> Result<String, AuthError> {
        let exp = (Utc::now() + chrono::Duration::minutes(self.lifetime_minutes)).timestamp();
        let claims = Claims {
            sub: account_id.to_string(),
            tenant_id: tenant_id.to_string(),
            is_superuser,
            exp,
        };
        encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(AuthError::Encode)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(self.algorithm);
        decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime_minutes * 60
    }
}

/// Pulls the bearer token out of an `Authorization` header value.
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ").map(str::trim)
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(AuthError::Hash)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(AuthError::Hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_back_to_same_claims() {
        let manager = JwtManager::new("test-secret", "HS256", 30);
        let token = manager.issue("acct-1", "tenant-a", false).unwrap();
        let claims = manager.validate(&token).unwrap();
        assert_eq!(claims.sub, "acct-1");
        assert_eq!(claims.tenant_id, "tenant-a");
        assert!(!claims.is_superuser);
    }

    #[test]
    fn garbage_token_is_rejected() {
        let manager = JwtManager::new("test-secret", "HS256", 30);
        assert!(manager.validate("not-a-token").is_err());
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("abc123"), None);
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("s3cr3t").unwrap();
        assert!(verify_password("s3cr3t", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
