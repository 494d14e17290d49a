use super::json_body;
use crate::error::AppError;
use crate::response::success_one_ok;
use crate::service::AuthService;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

/// POST /auth: exchange username and password for a fresh API token.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let login = AuthService::login(state.store.as_ref(), json_body(body)?).await?;
    Ok(success_one_ok(login))
}
