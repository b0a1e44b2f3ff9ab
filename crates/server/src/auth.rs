//! Bearer-token verification and the admin guard.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::RequestPartsExt;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use model::User;
use repository::UsersRepository;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token creation failed")]
    TokenCreation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub email: String,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
}

/// HS256 verification keys derived from the configured secret.
///
/// Tokens are issued elsewhere; this side only verifies them and refuses any
/// token whose lifetime (`exp - iat`) exceeds `max_age`.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_age: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, max_age: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            max_age,
        }
    }

    pub fn encode(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
            .map_err(|_| AuthError::TokenCreation)
    }

    /// Verifies signature, expiry and lifetime.
    pub fn decode(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)?;

        let lifetime = claims.exp.saturating_sub(claims.iat) as u64;
        if claims.exp < claims.iat || lifetime > self.max_age.as_secs() {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

/// Extractor that only succeeds for a valid token of an administrator.
///
/// Missing or invalid tokens are `401`; valid tokens of unknown or
/// non-admin users are `403`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized("Missing or invalid authorization header".into()))?;

        let claims = state.jwt.decode(bearer.token()).map_err(|e| {
            tracing::warn!("Token rejected: {e}");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        let user = state
            .users
            .get_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Forbidden("Admin access required".into()))?;

        if !user.is_admin {
            return Err(ApiError::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser(user))
    }
}
