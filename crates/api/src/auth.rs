//! Authentication: password hashing, bearer tokens and the `AuthUser`
//! extractor.
//!
//! Password hashes are stored as `sha256$<rounds>$<salt-hex>$<digest-hex>`.
//! Tokens are HS256 JWTs whose `sub` is the user id.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tasktrack_db::User;
use tracing::debug;

/// Hash iterations for new passwords
pub const PASSWORD_ROUNDS: u32 = 10_000;

/// Upper bound accepted when verifying a stored hash
const MAX_PASSWORD_ROUNDS: u32 = 1_000_000;

const SALT_LEN: usize = 16;

fn digest_password(password: &str, salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 1..rounds {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(password.as_bytes())
            .finalize()
            .into();
    }
    digest
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::rng().random();
    let digest = digest_password(password, &salt, PASSWORD_ROUNDS);
    format!(
        "sha256${}${}${}",
        PASSWORD_ROUNDS,
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("sha256"), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    if rounds == 0 || rounds > MAX_PASSWORD_ROUNDS {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };

    constant_time_eq(&digest_password(password, &salt, rounds), &expected)
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {}", e)))
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_async(password: String, stored: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("password check task failed: {}", e)))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&x, &y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies bearer tokens
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "rejected bearer token");
                ApiError::unauthorized("invalid or expired token")
            })
    }
}

/// The authenticated caller, resolved from the `Authorization: Bearer` header
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;
    let header = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid authorization header"))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("expected a bearer token"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify(token)?;
        let user = state
            .db
            .users()
            .get(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("account no longer exists"))?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse");
        assert!(hash.starts_with(&format!("sha256${}$", PASSWORD_ROUNDS)));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let hash = hash_password_async("correct horse".to_string()).await.unwrap();
        assert!(
            verify_password_async("correct horse".to_string(), hash.clone())
                .await
                .unwrap()
        );
        assert!(
            !verify_password_async("wrong horse".to_string(), hash)
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_malformed_hashes_never_match() {
        for stored in [
            "",
            "plain",
            "md5$1$00$00",
            "sha256$x$00$00",
            "sha256$0$00$00",
            "sha256$1$zz$00",
            "sha256$1$00$00$extra",
        ] {
            assert!(!verify_password("anything", stored), "{stored}");
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn test_token_round_trip() {
        let tokens = TokenService::new(b"0123456789abcdef", 60);
        let token = tokens.issue("ab12cd34").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "ab12cd34");
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let issuer = TokenService::new(b"0123456789abcdef", 60);
        let verifier = TokenService::new(b"fedcba9876543210", 60);
        let token = issuer.issue("ab12cd34").unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenService::new(b"0123456789abcdef", 60);
        let past = Utc::now().timestamp() - 3600;
        let claims = Claims {
            sub: "ab12cd34".to_string(),
            iat: past - 60,
            exp: past,
        };
        let token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &tokens.encoding).unwrap();
        assert!(tokens.verify(&token).is_err());
    }
}
