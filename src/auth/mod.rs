/*!
 * # Authentication and Authorization Module
 *
 * Every core operation takes an explicit [`Actor`]. Over HTTP the actor is
 * recovered from an HS256 bearer token whose claims carry the user id and
 * storefront role. Staff-only operations check the role through
 * [`Actor::require_staff`].
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::UserRole;
use crate::errors::{ApiError, ServiceError};

/// The identity on whose behalf an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn client(id: Uuid) -> Self {
        Self::new(id, UserRole::Client)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Fails with `Forbidden` unless the actor is a manager or admin.
    pub fn require_staff(&self) -> Result<(), ServiceError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "role '{}' cannot perform staff operations",
                self.role
            )))
        }
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user ID)
    pub role: UserRole,
    pub jti: String,   // JWT ID
    pub iat: i64,      // Issued at time
    pub exp: i64,      // Expiration time
    pub iss: String,   // Issuer
    pub aud: String,   // Audience
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::ServiceError(err.into())
    }
}

/// Issues and validates bearer tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Signs an access token for the given actor.
    pub fn issue_token(&self, actor: &Actor) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: actor.id.to_string(),
            role: actor.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Resolves a bearer token to the actor it was issued for.
    pub fn actor_from_token(&self, token: &str) -> Result<Actor, AuthError> {
        let claims = self.validate_token(token)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Actor::new(id, claims.role))
    }
}

/// Extractor yielding the authenticated [`Actor`] from the `Authorization` header
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AuthError::MissingAuth)?;

        let actor = auth_service.actor_from_token(token)?;
        debug!(actor_id = %actor.id, role = %actor.role, "authenticated request");
        Ok(AuthenticatedUser(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "a_test_secret_that_is_long_enough_for_hs256_signing".into(),
            "grocery-storefront".into(),
            "grocery-api".into(),
            Duration::from_secs(600),
        ))
    }

    #[test]
    fn issued_token_resolves_to_same_actor() {
        let auth = service();
        let actor = Actor::new(Uuid::new_v4(), UserRole::Manager);
        let token = auth.issue_token(&actor).unwrap();
        assert_eq!(auth.actor_from_token(&token).unwrap(), actor);
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let auth = service();
        let mut other = service();
        other.config.jwt_issuer = "someone-else".into();
        let token = other.issue_token(&Actor::client(Uuid::new_v4())).unwrap();
        assert_matches!(auth.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_matches!(
            service().actor_from_token("not-a-jwt"),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn only_staff_pass_staff_check() {
        let id = Uuid::new_v4();
        assert_matches!(
            Actor::client(id).require_staff(),
            Err(ServiceError::Forbidden(_))
        );
        assert!(Actor::new(id, UserRole::Manager).require_staff().is_ok());
        assert!(Actor::new(id, UserRole::Admin).require_staff().is_ok());
    }

    #[test]
    fn auth_errors_map_to_unauthorized() {
        let err: ServiceError = AuthError::TokenExpired.into();
        assert_matches!(err, ServiceError::Unauthorized(_));
    }
}
