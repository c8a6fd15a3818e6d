use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use model::entities::user;

use crate::errors::ApiError;
use crate::schemas::AppState;

/// Session tokens live for a week; the live-row check on every request
/// makes revocation immediate regardless.
pub const SESSION_TTL_DAYS: i64 = 7;
/// Action tokens ride in emailed links, so they get a longer fuse.
pub const ACTION_TTL_HOURS: i64 = 48;

/// Discriminator baked into every token. Verification demands the kind
/// the call site expects, so a session token can never drive a
/// registration decision link and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Session,
    RegistrationAction,
}

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id the token speaks for.
    pub sub: i32,
    pub email: String,
    pub role: String,
    /// Token kind tag, checked against the use site.
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing and verification keys, built once from the configured
/// secret and shared through [`AppState`].
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_session(&self, user: &user::Model) -> Result<String, ApiError> {
        self.issue(user, TokenKind::Session, Duration::days(SESSION_TTL_DAYS))
    }

    pub fn issue_registration_action(&self, user: &user::Model) -> Result<String, ApiError> {
        self.issue(
            user,
            TokenKind::RegistrationAction,
            Duration::hours(ACTION_TTL_HOURS),
        )
    }

    fn issue(
        &self,
        user: &user::Model,
        typ: TokenKind,
        ttl: Duration,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: role_name(user.role).to_string(),
            typ,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry, then demand the expected kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| {
                debug!("Token verification failed: {}", e);
                ApiError::Unauthorized("Invalid or expired token".to_string())
            })?;
        if data.claims.typ != expected {
            return Err(ApiError::Unauthorized(
                "Token is not valid for this operation".to_string(),
            ));
        }
        Ok(data.claims)
    }
}

pub fn role_name(role: user::Role) -> &'static str {
    match role {
        user::Role::Admin => "admin",
        user::Role::User => "user",
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

fn bearer_token(parts: &Parts) -> Result<String, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))
}

/// The authenticated caller.
///
/// The token subject is re-resolved to a live user row on every request;
/// a deleted or deactivated user is rejected immediately, with no grace
/// period until token expiry.
pub struct AuthUser(pub user::Model);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify(&token, TokenKind::Session)?;
        let user = user::Entity::find_by_id(claims.sub)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;
        if !user.is_active {
            return Err(ApiError::Unauthorized(
                "Account has been deactivated".to_string(),
            ));
        }
        Ok(AuthUser(user))
    }
}

/// An authenticated caller holding the admin role. Authenticated
/// non-admins get a 403, not a 401.
pub struct AdminUser(pub user::Model);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != user::Role::Admin {
            return Err(ApiError::Forbidden(
                "Administrator role required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user(role: user::Role) -> user::Model {
        user::Model {
            id: 7,
            email: "someone@office.test".to_string(),
            name: "Someone".to_string(),
            password_hash: String::new(),
            role,
            is_active: true,
            max_coffees: None,
            notify_on_consumption: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn session_token_roundtrip() {
        let keys = TokenKeys::new("unit-test-secret");
        let token = keys.issue_session(&sample_user(user::Role::User)).unwrap();
        let claims = keys.verify(&token, TokenKind::Session).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, "user");
        assert_eq!(claims.typ, TokenKind::Session);
    }

    #[test]
    fn token_kind_mismatch_is_rejected() {
        let keys = TokenKeys::new("unit-test-secret");
        let user = sample_user(user::Role::User);

        let session = keys.issue_session(&user).unwrap();
        assert!(keys.verify(&session, TokenKind::RegistrationAction).is_err());

        let action = keys.issue_registration_action(&user).unwrap();
        assert!(keys.verify(&action, TokenKind::Session).is_err());
        assert!(keys.verify(&action, TokenKind::RegistrationAction).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let keys = TokenKeys::new("unit-test-secret");
        let other = TokenKeys::new("some-other-secret");
        let token = keys.issue_session(&sample_user(user::Role::Admin)).unwrap();
        assert!(other.verify(&token, TokenKind::Session).is_err());
    }

    #[test]
    fn kind_tag_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&TokenKind::RegistrationAction).unwrap(),
            "\"registration_action\""
        );
        assert_eq!(
            serde_json::to_string(&TokenKind::Session).unwrap(),
            "\"session\""
        );
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("espresso").unwrap();
        assert!(verify_password("espresso", &hash));
        assert!(!verify_password("ristretto", &hash));
    }
}
