//! Authentication: argon2 password hashes, HS256 access tokens and the
//! `AuthUser` extractor every protected handler takes.

pub mod handlers;
pub mod users;

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

/// Argon2 is CPU-bound; hashing runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(anyhow!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| AppError::Internal(anyhow!("password hashing task failed: {e}")))?
}

/// False for a wrong password and for a hash that cannot be parsed.
pub async fn verify_password(password: &str, password_hash: &str) -> bool {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

pub fn issue_access_token(
    secret: &str,
    user_id: Uuid,
    ttl_minutes: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
        token_type: ACCESS_TOKEN_TYPE.to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow!("token signing failed: {e}")))
}

pub fn decode_access_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected access token: {e}");
        AppError::Unauthorized
    })?;

    if data.claims.token_type != ACCESS_TOKEN_TYPE {
        return Err(AppError::Unauthorized);
    }
    Ok(data.claims)
}

/// Pulls the bearer token out of an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The authenticated caller. Rejects with 401 before the handler body runs.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::Unauthorized)?;

        let claims = decode_access_token(&state.config.jwt_secret, token)?;
        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[tokio::test]
    async fn test_password_hash_verifies() {
        let hash = hash_password("correct horse battery").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash).await);
        assert!(!verify_password("wrong", &hash).await);
        assert!(!verify_password("anything", "not-a-hash").await);
    }

    #[test]
    fn test_access_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue_access_token(SECRET, user_id, 30).unwrap();
        let claims = decode_access_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = issue_access_token(SECRET, Uuid::new_v4(), -10).unwrap();
        assert!(matches!(
            decode_access_token(SECRET, &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let token = issue_access_token("other-secret", Uuid::new_v4(), 30).unwrap();
        assert!(decode_access_token(SECRET, &token).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
