//! Users with their nested profile and doctor records.

use super::{json_body, parse_id};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{Mode, UserService};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

pub async fn list(State(state): State<AppState>, AuthUser(caller): AuthUser) -> Result<impl IntoResponse, AppError> {
    let users = UserService::list(state.store.as_ref(), &caller).await?;
    Ok(success_many(users))
}

pub async fn read(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserService::retrieve(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(success_one_ok(user))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserService::create(state.store.as_ref(), &caller, json_body(body)?).await?;
    Ok(success_one(user))
}

pub async fn replace(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserService::update(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Full).await?;
    Ok(success_one_ok(user))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserService::update(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Partial).await?;
    Ok(success_one_ok(user))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    UserService::delete(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
