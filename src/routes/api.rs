//! Resource routes mounted under `/api`.

use crate::handlers::{assets, auth, doctors, exams, imaging, users};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth", post(auth::login))
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/:id",
            get(users::read).put(users::replace).patch(users::update).delete(users::delete),
        )
        .route("/doctors", get(doctors::list).post(doctors::create))
        .route(
            "/doctors/:user_id",
            get(doctors::read)
                .put(doctors::replace)
                .patch(doctors::update)
                .delete(doctors::delete),
        )
        .route("/assets", get(assets::list).post(assets::create))
        .route(
            "/assets/:id",
            get(assets::read).put(assets::replace).patch(assets::update).delete(assets::delete),
        )
        .route("/exam-categories", get(exams::list_categories).post(exams::create_category))
        .route(
            "/exam-categories/:id",
            get(exams::read_category)
                .put(exams::replace_category)
                .patch(exams::update_category)
                .delete(exams::delete_category),
        )
        .route("/exam-items", get(exams::list_items).post(exams::create_item))
        .route(
            "/exam-items/:id",
            get(exams::read_item)
                .put(exams::replace_item)
                .patch(exams::update_item)
                .delete(exams::delete_item),
        )
        .route("/imaging-requests", get(imaging::list).post(imaging::create))
        .route(
            "/imaging-requests/:id",
            get(imaging::read)
                .put(imaging::replace)
                .patch(imaging::update)
                .delete(imaging::delete),
        )
        .route("/imaging-requests/:id/generate_pdf", get(imaging::generate_pdf))
        .route("/imaging-requests/:id/history", get(imaging::history))
        .route("/openapi.json", get(openapi))
        .with_state(state)
}
