//! Exam catalog: categories (with their items embedded) and items.

use super::{json_body, parse_id};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{ExamService, Mode};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

type Body = Result<Json<Value>, JsonRejection>;

pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_many(ExamService::list_categories(state.store.as_ref()).await?))
}

pub async fn read_category(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(ExamService::retrieve_category(state.store.as_ref(), parse_id(&id)?).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let category = ExamService::create_category(state.store.as_ref(), &caller, json_body(body)?).await?;
    Ok(success_one(category))
}

pub async fn replace_category(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let category =
        ExamService::update_category(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Full).await?;
    Ok(success_one_ok(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let category =
        ExamService::update_category(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Partial)
            .await?;
    Ok(success_one_ok(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ExamService::delete_category(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `?category=<id>` narrows the list to one category.
pub async fn list_items(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_many(ExamService::list_items(state.store.as_ref(), &params).await?))
}

pub async fn read_item(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(ExamService::retrieve_item(state.store.as_ref(), parse_id(&id)?).await?))
}

pub async fn create_item(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let item = ExamService::create_item(state.store.as_ref(), &caller, json_body(body)?).await?;
    Ok(success_one(item))
}

pub async fn replace_item(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let item = ExamService::update_item(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Full).await?;
    Ok(success_one_ok(item))
}

pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let item =
        ExamService::update_item(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Partial).await?;
    Ok(success_one_ok(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ExamService::delete_item(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
