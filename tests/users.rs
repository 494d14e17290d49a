mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn staff_creates_user_with_profile_and_doctor() {
    let app = TestApp::new();
    let admin = app.staff("admin").await;
    let token = app.token(&admin).await;

    let (status, body) = app
        .post(
            "/api/users",
            Some(&token),
            json!({
                "username": "cvera",
                "email": "cvera@hospital.cl",
                "password": "inicial-123",
                "userprofile": {"full_name": "Carla Vera", "area": "Imagenología"},
                "doctor": {"full_name": "Carla Vera", "specialty": "Radiología", "medical_license": ""}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let data = &body["data"];
    assert_eq!(data["username"], "cvera");
    assert_eq!(data["es_doctor"], true);
    assert_eq!(data["userprofile"]["area"], "Imagenología");
    assert_eq!(data["doctor"]["medical_license"], Value::Null);
    assert!(data.get("password").is_none());

    let (status, body) = app
        .post("/api/auth", None, json!({"username": "cvera", "password": "inicial-123"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user_profile"]["full_name"], "Carla Vera");
}

#[tokio::test]
async fn errors_from_nested_records_are_reported_together() {
    let app = TestApp::new();
    let token = app.token(&app.staff("admin").await).await;

    let (status, body) = app
        .post(
            "/api/users",
            Some(&token),
            json!({
                "username": "con espacio",
                "userprofile": {"phone_number": "0".repeat(25)},
                "doctor": "no es un objeto"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = &body["error"]["details"];
    assert!(details["username"].is_array());
    assert!(details["userprofile.phone_number"].is_array());
    assert!(details["doctor"].is_array());
}

#[tokio::test]
async fn non_staff_see_and_edit_only_themselves() {
    let app = TestApp::new();
    app.staff("admin").await;
    let me = app.plain("pmunoz").await;
    let other = app.plain("otro").await;
    let token = app.token(&me).await;

    let (_, body) = app.get("/api/users", Some(&token)).await;
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["username"], "pmunoz");

    assert_eq!(app.get(&format!("/api/users/{}", other.id), Some(&token)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        app.post("/api/users", Some(&token), json!({"username": "nuevo"})).await.0,
        StatusCode::FORBIDDEN
    );

    let uri = format!("/api/users/{}", me.id);
    let (status, _) = app.patch(&uri, Some(&token), json!({"is_staff": true})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&uri, Some(&token), json!({"userprofile": {"position": "Técnico"}}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["userprofile"]["position"], "Técnico");
    assert_eq!(body["data"]["username"], "pmunoz");
}

#[tokio::test]
async fn absent_doctor_is_kept_by_patch_and_removed_by_put() {
    let app = TestApp::new();
    let token = app.token(&app.staff("admin").await).await;
    let doc = app.doctor("drojas", "Ana Rojas").await;
    let uri = format!("/api/users/{}", doc.id);

    let (status, body) = app.patch(&uri, Some(&token), json!({"email": "ana@hospital.cl"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["es_doctor"], true);
    assert_eq!(body["data"]["doctor"]["full_name"], "Ana Rojas");

    let (status, body) = app
        .patch(&uri, Some(&token), json!({"doctor": {"specialty": "Neurorradiología"}}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doctor"]["specialty"], "Neurorradiología");
    assert_eq!(body["data"]["doctor"]["full_name"], "Ana Rojas");

    let (status, body) = app.put(&uri, Some(&token), json!({"username": "drojas"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["es_doctor"], false);
    assert_eq!(app.get(&format!("/api/doctors/{}", doc.id), Some(&token)).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn doctor_records_by_user() {
    let app = TestApp::new();
    let admin_token = app.token(&app.staff("admin").await).await;
    let user = app.plain("jsoto").await;
    let user_token = app.token(&user).await;
    let stranger = app.plain("extra").await;

    let (status, _) = app
        .post("/api/doctors", Some(&user_token), json!({"user": stranger.id, "full_name": "X"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/doctors",
            Some(&user_token),
            json!({"user": user.id, "full_name": "Jorge Soto", "medical_license": "RM-100"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["user"], user.id);

    let (status, body) = app
        .post("/api/doctors", Some(&admin_token), json!({"user": user.id}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["user"].is_array());

    let (status, body) = app
        .post(
            "/api/doctors",
            Some(&admin_token),
            json!({"user": stranger.id, "medical_license": "RM-100"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["medical_license"].is_array());

    let uri = format!("/api/doctors/{}", user.id);
    let (status, body) = app.patch(&uri, Some(&user_token), json!({"specialty": "Radiología"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["full_name"], "Jorge Soto");

    let (_, body) = app.get("/api/doctors", Some(&user_token)).await;
    assert_eq!(body["meta"]["count"], 1);

    assert_eq!(app.delete(&uri, Some(&admin_token)).await.0, StatusCode::NO_CONTENT);
    let (_, body) = app.get(&format!("/api/users/{}", user.id), Some(&admin_token)).await;
    assert_eq!(body["data"]["es_doctor"], false);
}

#[tokio::test]
async fn deleting_a_user_revokes_access() {
    let app = TestApp::new();
    let admin_token = app.token(&app.staff("admin").await).await;
    let user = app.plain("temporal").await;
    let token = app.token(&user).await;

    let (status, _) = app.delete(&format!("/api/users/{}", user.id), Some(&admin_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/api/users", Some(&token)).await.0, StatusCode::UNAUTHORIZED);
}
