//! Router assembly: health and build info at the root, resources under `/api`.

pub mod api;
pub mod common;

pub use api::api_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower::Layer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

/// CORS restricted to the configured origins; invalid entries are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "invalid CORS origin, skipping");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Every route with body limit, CORS and tracing. Paths are matched as written; use
/// [`service`] to also accept a trailing slash.
pub fn app(state: AppState) -> Router {
    let settings = state.settings.clone();
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api", api_routes(state))
        .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes))
        .layer(cors_layer(&settings.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// What the server runs: [`app`] behind trailing-slash trimming, which has to wrap the
/// router from outside because router layers run after routing.
pub fn service(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(app(state))
}
