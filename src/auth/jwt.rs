//! Token Issuer (component B): argon2 password hashing, HS256 JWT
//! issue/verify, and registration/login flows. Grounded in the teacher's
//! `user_auth/service.rs` — same `Claims` shape, same argon2 + jsonwebtoken
//! pairing — generalized with the hash-ring-sharded verification cache from
//! [`super::token_cache`] so a hot token's repeated re-verification during a
//! flash sale doesn't re-run HS256 + a store round trip on every request.

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token_cache::TokenVerifyCache;
use crate::core_types::UserId;
use crate::store::Store;

/// JWT claims. `sub` carries the user id as a string per the JWT RFC's
/// convention that `sub` is always textual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

pub struct AuthResponse {
    pub token: String,
    pub user_id: UserId,
    pub username: String,
}

pub struct TokenIssuer {
    store: Arc<dyn Store>,
    verify_cache: TokenVerifyCache,
    jwt_secret: String,
    token_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn Store>,
        verify_cache: TokenVerifyCache,
        jwt_secret: impl Into<String>,
        token_ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            verify_cache,
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::hours(token_ttl_hours),
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<UserId, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string();

        match self.store.get_user_by_username(username).await {
            Ok(_) => return Err(AuthError::UsernameTaken),
            Err(crate::store::StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let user = self.store.create_user(username, &password_hash).await?;
        Ok(user.id)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let user = self
            .store
            .get_user_by_username(username)
            .await
            .map_err(|e| match e {
                crate::store::StoreError::NotFound => AuthError::InvalidCredentials,
                other => other.into(),
            })?;

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            exp: (now + self.token_ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        self.verify_cache.set(&token, &claims).await;

        Ok(AuthResponse {
            token,
            user_id: user.id,
            username: user.username,
        })
    }

    /// Verify a bearer token, consulting the hash-ring-sharded cache before
    /// paying for a full HS256 decode.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if let Some(claims) = self.verify_cache.get(token).await {
            if (claims.exp as i64) > Utc::now().timestamp() {
                return Ok(claims);
            }
        }

        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            }
        })?;

        self.verify_cache.set(token, &token_data.claims).await;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_ring::HashRing;
    use crate::cache::InMemoryCache;
    use crate::store::MemoryStore;

    fn issuer() -> TokenIssuer {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let ring = HashRing::new(&[], 50);
        let verify_cache = TokenVerifyCache::new(cache, ring, 600);
        TokenIssuer::new(store, verify_cache, "test-secret", 24)
    }

    #[tokio::test]
    async fn register_then_login_then_verify_round_trips() {
        let issuer = issuer();
        let user_id = issuer.register("alice", "hunter2").await.unwrap();
        let auth = issuer.login("alice", "hunter2").await.unwrap();
        assert_eq!(auth.user_id, user_id);

        let claims = issuer.verify(&auth.token).await.unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_rejected() {
        let issuer = issuer();
        issuer.register("bob", "correct-horse").await.unwrap();
        let err = issuer.login("bob", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let issuer = issuer();
        issuer.register("carol", "pw").await.unwrap();
        let err = issuer.register("carol", "pw2").await.unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
    }

    #[tokio::test]
    async fn verify_hits_cache_on_second_call() {
        let issuer = issuer();
        issuer.register("dora", "pw").await.unwrap();
        let auth = issuer.login("dora", "pw").await.unwrap();
        // First verify populates the cache via login's own `set`; second
        // verify should be served from it without re-decoding.
        let first = issuer.verify(&auth.token).await.unwrap();
        let second = issuer.verify(&auth.token).await.unwrap();
        assert_eq!(first.sub, second.sub);
    }

    #[tokio::test]
    async fn expired_token_is_rejected_even_straight_off_the_wire() {
        let issuer = issuer();
        let now = Utc::now();
        let claims = Claims {
            sub: "99".to_string(),
            iat: (now - Duration::hours(3)).timestamp() as usize,
            exp: (now - Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let err = issuer.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn expired_cached_claims_are_never_returned() {
        let issuer = issuer();
        let now = Utc::now();
        let claims = Claims {
            sub: "100".to_string(),
            iat: (now - Duration::hours(3)).timestamp() as usize,
            exp: (now - Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        // Poison the cache directly with already-expired claims, bypassing
        // the normal `set`-on-verify path, to prove property 5 is enforced
        // at read time and not just at insert time.
        issuer.verify_cache.set(&token, &claims).await;

        let err = issuer.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }
}
