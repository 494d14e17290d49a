//! Success envelopes: `{"data": ...}` for one record, `{"data": [...], "meta": {"count": n}}` for lists.
//! Errors use the envelope in `error.rs`; deletes answer 204 with no body.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: usize,
}

/// 201 with the created record.
pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len();
    (StatusCode::OK, Json(SuccessMany { data, meta: MetaCount { count } }))
}

/// PDF download, named so browsers save rather than display it.
pub fn pdf_attachment(filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_counts_records() {
        let (status, Json(body)) = success_many(vec!["a", "b"]);
        assert_eq!(status, StatusCode::OK);
        let v = serde_json::to_value(body).unwrap();
        assert_eq!(v["meta"]["count"], 2);
        assert_eq!(v["data"][1], "b");
    }

    #[test]
    fn pdf_headers() {
        let response = pdf_attachment("solicitud_imagenologia_7.pdf", b"%PDF-1.5".to_vec());
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"solicitud_imagenologia_7.pdf\""
        );
    }
}
