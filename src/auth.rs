use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use chrono::{Duration, Utc};
use http::header::AUTHORIZATION;
use http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;

#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Arc<Self> {
        Arc::new(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// The contents of a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Id of the user the token was issued to.
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signs a token for `user_id`. Tokens normally come from the identity
/// provider; this is for local tooling and tests.
pub fn issue_token(user_id: &str, ttl: Duration, keys: &JwtKeys) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };
    encode(&Header::default(), &claims, keys.encoding_key())
        .map_err(|e| AppError::Internal(format!("token creation failed: {}", e)))
}

pub fn verify_token(token: &str, keys: &JwtKeys) -> Result<Claims, AppError> {
    decode::<Claims>(token, keys.decoding_key(), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed authorization header".to_string()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::Unauthorized("Missing bearer token".to_string())),
    }
}

/// The authenticated caller. Ownership is always bound from here, never from a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<JwtKeys>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let keys = <Arc<JwtKeys> as FromRef<S>>::from_ref(state);
        let claims = verify_token(token, &keys)?;
        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}
