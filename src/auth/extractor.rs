//! Axum extractors resolving the caller from `Authorization: Token <key>`.

use super::token::{digest, key_from_header};
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;
use crate::store::TokenStore;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(key) = key_from_header(parts.headers.get(AUTHORIZATION))? else {
        return Ok(None);
    };
    let user = state
        .store
        .user_for_token(&digest(&key))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token.".into()))?;
    if !user.is_active {
        tracing::warn!(user_id = user.id, "token used by inactive user");
        return Err(AppError::Unauthorized("User inactive or deleted.".into()));
    }
    Ok(Some(user))
}

/// An authenticated caller. Rejects with 401 when no valid token is present.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        resolve(parts, &state)
            .await?
            .map(AuthUser)
            .ok_or_else(AppError::not_authenticated)
    }
}

/// Anonymous callers are allowed, but a bad token still answers 401.
pub struct MaybeAuthUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(MaybeAuthUser(resolve(parts, &state).await?))
    }
}
