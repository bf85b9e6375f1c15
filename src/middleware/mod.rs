use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::EngineError;

pub const SESSION_HEADER: &str = "x-session-id";

/// Пользователь, подтверждённый внешним identity-провайдером.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Claims of the provider token. `sub` is the opaque user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn verify_token(token: &str, secret: &str) -> Result<String, EngineError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        EngineError::Authorization
    })?;

    let user_id = data.claims.sub.trim().to_string();
    if user_id.is_empty() {
        return Err(EngineError::Authorization);
    }
    Ok(user_id)
}

/// Signs a token the way the identity provider does. Used by local tooling and tests.
pub fn issue_token(
    user_id: &str,
    secret: &str,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

// Bearer JWT extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = EngineError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(EngineError::Authorization)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(EngineError::Authorization)?;

        let user_id = verify_token(token.trim(), &state.config.jwt.secret)?;
        Ok(AuthUser { user_id })
    }
}

/// Browsing session that owns a hold, taken from `X-Session-Id`.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = EngineError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| SessionId(value.to_string()))
            .ok_or_else(|| EngineError::Validation("X-Session-Id header is required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let token = issue_token("42", "secret", chrono::Duration::minutes(5)).unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap(), "42");
        assert_eq!(verify_token(&token, "other").unwrap_err(), EngineError::Authorization);
    }

    #[test]
    fn expired_or_garbage_tokens_are_rejected() {
        let token = issue_token("42", "secret", chrono::Duration::minutes(-10)).unwrap();
        assert_eq!(verify_token(&token, "secret").unwrap_err(), EngineError::Authorization);
        assert_eq!(verify_token("not-a-jwt", "secret").unwrap_err(), EngineError::Authorization);
    }
}
