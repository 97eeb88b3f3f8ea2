use crate::entities::user::UserRole;
use crate::errors::ServiceError;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// JWT claims carried by every session token. The dashboard decodes these
/// client-side to drive layout routing, so the field names are part of the
/// API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token signing/verification keys derived from the configured secret.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiration: Duration,
}

impl AuthKeys {
    pub fn new(secret: &str, expiration: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiration,
        }
    }

    /// Issue an access token for the given user.
    pub fn create_token(
        &self,
        user: &crate::entities::user::Model,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.expiration).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {e}")))
    }

    /// Validate a token and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| ServiceError::Unauthorized("invalid or expired token".to_string()))
    }
}

/// Authenticated identity extracted from a validated token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = ServiceError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role = UserRole::from_str(&claims.role)
            .map_err(|_| ServiceError::Unauthorized(format!("unknown role: {}", claims.role)))?;

        Ok(Self {
            user_id: claims.user_id,
            name: claims.name,
            email: claims.email,
            phone_number: claims.phone_number,
            role,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("authentication required".to_string()))
    }
}

/// Middleware that validates the bearer token and stores the authenticated
/// user in the request extensions for extractors and role checks downstream.
pub async fn auth_middleware(
    State(state): State<crate::AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

    let claims = state.auth_keys.validate_token(&token)?;
    let user = AuthUser::try_from(claims)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Middleware restricting a route group to admin accounts. Must run after
/// `auth_middleware`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ServiceError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ServiceError::Unauthorized("authentication required".to_string()))?;

    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "admin access required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &http::HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// Hash a password with argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("failed to hash password: {e}")))
}

/// Verify a password against a stored argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::InternalError(format!("corrupt password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> crate::entities::user::Model {
        crate::entities::user::Model {
            id: 42,
            name: "Wanjiku".to_string(),
            email: "wanjiku@example.com".to_string(),
            phone_number: "+254700000001".to_string(),
            role: "staff".to_string(),
            password_hash: String::new(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let keys = AuthKeys::new("a_test_secret_long_enough_for_hs256_use", Duration::from_secs(60));
        let token = keys.create_token(&test_user()).expect("token");

        let claims = keys.validate_token(&token).expect("claims");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, "staff");
        assert_eq!(claims.email, "wanjiku@example.com");

        let user = AuthUser::try_from(claims).expect("auth user");
        assert!(!user.is_admin());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let keys = AuthKeys::new("a_test_secret_long_enough_for_hs256_use", Duration::from_secs(60));
        let other = AuthKeys::new("another_secret_entirely_for_this_check_", Duration::from_secs(60));

        let token = keys.create_token(&test_user()).expect("token");
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2hunter2").expect("hash");
        assert!(verify_password("hunter2hunter2", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }
}
