mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn catalog_nests_items_under_categories() {
    let app = TestApp::new();
    let token = app.token(&app.staff("admin").await).await;

    let (status, body) = app
        .post("/api/exam-categories", Some(&token), json!({"name": "Ecografía", "order": 2}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["exam_items"], json!([]));
    let eco = body["data"]["id"].as_i64().unwrap();
    let (_, body) = app
        .post("/api/exam-categories", Some(&token), json!({"name": "Radiología", "order": 1}))
        .await;
    let rx = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            "/api/exam-items",
            Some(&token),
            json!({"category": eco, "name": "Abdomen", "code": "04 04 003", "description": "Ayuno 6 horas"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["category_name"], "Ecografía");
    app.post(
        "/api/exam-items",
        Some(&token),
        json!({"category": rx, "name": "Tórax", "code": "04 01 070"}),
    )
    .await;

    let (_, body) = app.get("/api/exam-categories", Some(&token)).await;
    assert_eq!(body["data"][0]["name"], "Radiología");
    assert_eq!(body["data"][1]["exam_items"][0]["name"], "Abdomen");
    assert_eq!(body["data"][1]["exam_items"][0]["category_name"], "Ecografía");

    let (_, body) = app.get(&format!("/api/exam-items?category={}", rx), Some(&token)).await;
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["code"], "04 01 070");
}

#[tokio::test]
async fn uniqueness_and_cascade() {
    let app = TestApp::new();
    let token = app.token(&app.staff("admin").await).await;
    let (_, body) = app
        .post("/api/exam-categories", Some(&token), json!({"name": "Scanner"}))
        .await;
    let cat = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post("/api/exam-categories", Some(&token), json!({"name": "Scanner"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["name"].is_array());

    let item = json!({"category": cat, "name": "TAC Cerebro", "code": "04 03 001"});
    let (_, body) = app.post("/api/exam-items", Some(&token), item.clone()).await;
    let item_id = body["data"]["id"].as_i64().unwrap();
    let (status, body) = app.post("/api/exam-items", Some(&token), item).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["code"].is_array());

    let (status, body) = app
        .post("/api/exam-items", Some(&token), json!({"category": 999, "name": "X", "code": "X"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["category"].is_array());

    let (status, _) = app.delete(&format!("/api/exam-categories/{}", cat), Some(&token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/exam-items/{}", item_id), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_requires_authentication() {
    let app = TestApp::new();
    assert_eq!(app.get("/api/exam-categories", None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/api/exam-items", None).await.0, StatusCode::UNAUTHORIZED);
}
