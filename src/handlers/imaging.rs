//! Imaging requests, their audit history and the printable PDF.

use super::{json_body, parse_id};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::report;
use crate::response::{pdf_attachment, success_many, success_one, success_one_ok};
use crate::service::{ImagingService, Mode};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

type Body = Result<Json<Value>, JsonRejection>;

pub async fn list(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let requests = ImagingService::list(state.store.as_ref(), &caller, &params).await?;
    Ok(success_many(requests))
}

pub async fn read(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let request = ImagingService::retrieve(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(success_one_ok(request))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let request = ImagingService::create(state.store.as_ref(), &caller, json_body(body)?).await?;
    Ok(success_one(request))
}

pub async fn replace(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let request =
        ImagingService::update(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Full).await?;
    Ok(success_one_ok(request))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let request =
        ImagingService::update(state.store.as_ref(), &caller, parse_id(&id)?, json_body(body)?, Mode::Partial).await?;
    Ok(success_one_ok(request))
}

pub async fn delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    ImagingService::delete(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn history(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entries = ImagingService::history(state.store.as_ref(), &caller, parse_id(&id)?).await?;
    Ok(success_many(entries))
}

/// Rendering is CPU-bound, so it runs on the blocking pool.
pub async fn generate_pdf(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let data = ImagingService::report_data(state.store.as_ref(), &caller, id).await?;
    let logo = state.settings.logo_path.clone();
    let pdf = tokio::task::spawn_blocking(move || report::generate(&data, logo.as_deref()))
        .await
        .map_err(|e| AppError::Report(format!("report task failed: {}", e)))??;
    tracing::info!(id, by = caller.id, bytes = pdf.len(), "imaging request pdf generated");
    Ok(pdf_attachment(&report::filename(id), pdf))
}
