//! Doctor records, addressed by the owning user's id.

use super::{json_body, parse_id};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{DoctorService, Mode};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;

pub async fn list(State(state): State<AppState>, AuthUser(_caller): AuthUser) -> Result<impl IntoResponse, AppError> {
    let doctors = DoctorService::list(state.store.as_ref()).await?;
    Ok(success_many(doctors))
}

pub async fn read(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let doctor = DoctorService::retrieve(state.store.as_ref(), parse_id(&user_id)?).await?;
    Ok(success_one_ok(doctor))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let doctor = DoctorService::create(state.store.as_ref(), &caller, json_body(body)?).await?;
    Ok(success_one(doctor))
}

pub async fn replace(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let doctor =
        DoctorService::update(state.store.as_ref(), &caller, parse_id(&user_id)?, json_body(body)?, Mode::Full).await?;
    Ok(success_one_ok(doctor))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let doctor =
        DoctorService::update(state.store.as_ref(), &caller, parse_id(&user_id)?, json_body(body)?, Mode::Partial).await?;
    Ok(success_one_ok(doctor))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    DoctorService::delete(state.store.as_ref(), &caller, parse_id(&user_id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
