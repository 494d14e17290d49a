//! HTTP handlers: extract, call the service, wrap the result in the response envelope.

pub mod assets;
pub mod auth;
pub mod doctors;
pub mod exams;
pub mod imaging;
pub mod users;

use crate::error::AppError;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::Value;

/// Ids in paths are integers; anything else cannot name a record.
pub(crate) fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::NotFound(format!("no record with id '{}'", raw)))
}

/// Malformed JSON answers with the standard error envelope instead of axum's plain text.
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(v)| v).map_err(|e| AppError::BadRequest(e.body_text()))
}
