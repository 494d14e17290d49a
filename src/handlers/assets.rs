//! IT asset endpoints. Reads are open to anonymous callers.

use super::{json_body, parse_id};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{AssetService, Mode};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

pub async fn list(
    State(state): State<AppState>,
    MaybeAuthUser(_caller): MaybeAuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let assets = AssetService::list(state.store.as_ref(), &params).await?;
    Ok(success_many(assets))
}

pub async fn read(
    State(state): State<AppState>,
    MaybeAuthUser(_caller): MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let asset = AssetService::retrieve(state.store.as_ref(), parse_id(&id)?).await?;
    Ok(success_one_ok(asset))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let asset = AssetService::create(state.store.as_ref(), &caller, json_body(body)?).await?;
    Ok(success_one(asset))
}

async fn write(state: AppState, caller: AuthUser, id: String, body: Value, mode: Mode) -> Result<impl IntoResponse, AppError> {
    let asset = AssetService::update(state.store.as_ref(), &caller.0, parse_id(&id)?, body, mode).await?;
    Ok(success_one_ok(asset))
}

pub async fn replace(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    write(state, caller, id, json_body(body)?, Mode::Full).await
}

pub async fn update(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    write(state, caller, id, json_body(body)?, Mode::Partial).await
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    AssetService::delete(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
