//! # Auth Guard
//!
//! Admin-only operations need a bearer token.
//!
//! - `POST /api/login` checks the [`CredentialStore`] and hands out an HS256 token
//! - Token carries the username and expires after the configured TTL, one hour by default
//! - Missing header or missing `Bearer` value: `401`
//! - Bad signature, malformed or expired token: `403`
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{database::NoteStore, error::AppError, state::AppState};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub trait CredentialStore: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// One username/password pair loaded from configuration.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialStore for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        !self.password.is_empty() && username == self.username && password == self.password
    }
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, AppError> {
        self.issue_at(username, Utc::now().timestamp())
    }

    pub fn issue_at(&self, username: &str, issued_at: i64) -> Result<String, AppError> {
        let claims = Claims {
            sub: username.to_string(),
            iat: issued_at,
            exp: issued_at + self.ttl_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(Box::new(e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Rejected token: {e}");
                AppError::Forbidden
            })
    }

    /// Guard entry point for a raw `Authorization` header value.
    pub fn authorize(&self, header: Option<&str>) -> Result<Claims, AppError> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        self.verify(token)
    }
}

/// Extractor for routes only an admin may call.
#[derive(Debug, Clone)]
pub struct Admin(pub Claims);

#[axum::async_trait]
impl<N> FromRequestParts<Arc<AppState<N>>> for Admin
where
    N: NoteStore,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState<N>>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AppError::Forbidden))
            .transpose()?;

        state.tokens.authorize(header).map(Admin)
    }
}

/// Edit and delete guard, only enforced when `PROTECT_EDITS` is on.
#[derive(Debug, Clone)]
pub struct Editor(pub Option<Claims>);

#[axum::async_trait]
impl<N> FromRequestParts<Arc<AppState<N>>> for Editor
where
    N: NoteStore,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState<N>>) -> Result<Self, Self::Rejection> {
        if !state.config.protect_edits {
            return Ok(Editor(None));
        }

        let Admin(claims) = Admin::from_request_parts(parts, state).await?;

        Ok(Editor(Some(claims)))
    }
}
