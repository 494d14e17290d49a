mod common;

use axum::body::to_bytes;
use axum::http::{header, Method, StatusCode};
use clinic_admin::models::{ImagingRequestFields, User};
use clinic_admin::store::ImagingStore;
use clinic_admin::Settings;
use common::TestApp;
use serde_json::{json, Value};

struct Ward {
    app: TestApp,
    admin: String,
    doctor: User,
    doctor_token: String,
    other_doctor: User,
    clerk_token: String,
    exams: Vec<i64>,
}

async fn ward_with(settings: Settings) -> Ward {
    let app = TestApp::with_settings(settings);
    let admin = app.token(&app.staff("admin").await).await;
    let doctor = app.doctor("drojas", "Ana Rojas").await;
    let doctor_token = app.token(&doctor).await;
    let other_doctor = app.doctor("dsoto", "Luis Soto").await;
    let clerk_token = app.token(&app.plain("recepcion").await).await;

    let (_, body) = app
        .post("/api/exam-categories", Some(&admin), json!({"name": "Radiología Simple", "order": 1}))
        .await;
    let category = body["data"]["id"].as_i64().unwrap();
    let mut exams = Vec::new();
    for (name, code) in [("Tórax AP/L", "04 01 070"), ("Cráneo AP/L", "04 01 010")] {
        let (status, body) = app
            .post(
                "/api/exam-items",
                Some(&admin),
                json!({"category": category, "name": name, "code": code}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        exams.push(body["data"]["id"].as_i64().unwrap());
    }

    Ward {
        app,
        admin,
        doctor,
        doctor_token,
        other_doctor,
        clerk_token,
        exams,
    }
}

async fn ward() -> Ward {
    ward_with(Settings::default()).await
}

fn patient(name: &str) -> Value {
    json!({"patient_name": name, "patient_rut": "12.345.678-9", "diagnosis": "Tos persistente"})
}

impl Ward {
    async fn create(&self, token: &str, body: Value) -> Value {
        let (status, body) = self.app.post("/api/imaging-requests", Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"].clone()
    }
}

#[tokio::test]
async fn doctor_defaults_to_the_calling_doctor() {
    let w = ward().await;

    let mut body = patient("Juan Pérez");
    body["selected_exams"] = json!([w.exams[0], w.exams[1]]);
    let data = w.create(&w.doctor_token, body).await;
    assert_eq!(data["doctor"], w.doctor.id);
    assert_eq!(data["doctor_name"], "Ana Rojas");
    assert_eq!(data["is_deleted"], false);
    assert_eq!(data["selected_exams"].as_array().unwrap().len(), 2);
    assert!(data["request_date"].is_string());

    // an explicit id wins over the caller
    let mut body = patient("María Díaz");
    body["doctor"] = json!(w.other_doctor.id);
    let data = w.create(&w.doctor_token, body).await;
    assert_eq!(data["doctor"], w.other_doctor.id);

    // staff without a doctor record leave it empty
    let data = w.create(&w.admin, patient("Sin Médico")).await;
    assert_eq!(data["doctor"], Value::Null);
    assert_eq!(data["doctor_name"], "N/A");
}

#[tokio::test]
async fn update_resolves_the_doctor() {
    let w = ward().await;
    let created = w.create(&w.admin, patient("Sin Médico")).await;
    let uri = format!("/api/imaging-requests/{}", created["id"]);

    // absent key keeps the current doctor
    let (status, body) = w
        .app
        .patch(&uri, Some(&w.admin), json!({"observations": "urgente"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doctor"], Value::Null);

    let (_, body) = w
        .app
        .patch(&uri, Some(&w.admin), json!({"doctor": w.doctor.id}))
        .await;
    assert_eq!(body["data"]["doctor"], w.doctor.id);

    let (_, body) = w
        .app
        .patch(&uri, Some(&w.doctor_token), json!({"patient_phone": "+56 9 1234 5678"}))
        .await;
    assert_eq!(body["data"]["doctor"], w.doctor.id);
    assert_eq!(body["data"]["observations"], "urgente");

    let (_, body) = w.app.patch(&uri, Some(&w.admin), json!({"doctor": null})).await;
    assert_eq!(body["data"]["doctor"], Value::Null);

    let (status, body) = w.app.put(&uri, Some(&w.admin), json!({"diagnosis": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["patient_name"].is_array());
    assert!(body["error"]["details"]["patient_rut"].is_array());
}

#[tokio::test]
async fn callers_see_only_their_scope() {
    let w = ward().await;
    let mine = w.create(&w.doctor_token, patient("Paciente Uno")).await;
    let mut body = patient("Paciente Dos");
    body["doctor"] = json!(w.other_doctor.id);
    let theirs = w.create(&w.admin, body).await;

    let (_, body) = w.app.get("/api/imaging-requests", Some(&w.admin)).await;
    assert_eq!(body["meta"]["count"], 2);

    let (_, body) = w.app.get("/api/imaging-requests", Some(&w.doctor_token)).await;
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["id"], mine["id"]);

    let (_, body) = w.app.get("/api/imaging-requests", Some(&w.clerk_token)).await;
    assert_eq!(body["meta"]["count"], 0);

    let uri = format!("/api/imaging-requests/{}", theirs["id"]);
    assert_eq!(w.app.get(&uri, Some(&w.doctor_token)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(w.app.get(&uri, Some(&w.clerk_token)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(w.app.get(&uri, Some(&w.admin)).await.0, StatusCode::OK);

    let filtered = format!("/api/imaging-requests?doctor={}", w.other_doctor.id);
    let (_, body) = w.app.get(&filtered, Some(&w.admin)).await;
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["doctor_name"], "Luis Soto");
    let (_, body) = w.app.get(&filtered, Some(&w.doctor_token)).await;
    assert_eq!(body["meta"]["count"], 0);
}

#[tokio::test]
async fn unknown_references_are_rejected() {
    let w = ward().await;
    let mut body = patient("Juan Pérez");
    body["selected_exams"] = json!([w.exams[0], 9999]);
    let (status, resp) = w.app.post("/api/imaging-requests", Some(&w.admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["error"]["details"]["selected_exams"].is_array());

    let mut body = patient("Juan Pérez");
    body["doctor"] = json!(9999);
    let (status, resp) = w.app.post("/api/imaging-requests", Some(&w.admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["error"]["details"]["doctor"].is_array());
}

#[tokio::test]
async fn history_records_each_change_and_delete_is_soft() {
    let w = ward().await;
    let created = w.create(&w.doctor_token, patient("Juan Pérez")).await;
    let uri = format!("/api/imaging-requests/{}", created["id"]);

    w.app
        .patch(&uri, Some(&w.doctor_token), json!({"selected_exams": [w.exams[1]]}))
        .await;
    let (status, body) = w.app.get(&format!("{}/history", uri), Some(&w.doctor_token)).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["history_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["~", "+"]);
    assert_eq!(body["data"][0]["history_user_id"], w.doctor.id);
    assert_eq!(body["data"][0]["snapshot"]["selected_exams"], json!([w.exams[1]]));

    let (status, _) = w.app.delete(&uri, Some(&w.doctor_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(w.app.get(&uri, Some(&w.admin)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(w.app.get(&format!("{}/history", uri), Some(&w.admin)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(w.app.delete(&uri, Some(&w.admin)).await.0, StatusCode::NOT_FOUND);
    let (_, body) = w.app.get("/api/imaging-requests", Some(&w.admin)).await;
    assert_eq!(body["meta"]["count"], 0);

    let kinds: Vec<_> = w
        .app
        .store
        .request_history(created["id"].as_i64().unwrap())
        .await
        .unwrap()
        .iter()
        .map(|h| h.history_type.code())
        .collect();
    assert_eq!(kinds, ["-", "~", "+"]);
}

#[tokio::test]
async fn pdf_download() {
    let w = ward().await;
    let mut body = patient("Juan Pérez");
    body["selected_exams"] = json!(w.exams);
    let created = w.create(&w.doctor_token, body).await;
    let id = created["id"].as_i64().unwrap();
    let uri = format!("/api/imaging-requests/{}/generate_pdf", id);

    let response = w.app.send(Method::GET, &uri, Some(&w.doctor_token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"solicitud_imagenologia_{}.pdf\"", id).as_str()
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    assert_eq!(w.app.get(&uri, None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(w.app.get(&uri, Some(&w.clerk_token)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(
        w.app.get("/api/imaging-requests/9999/generate_pdf", Some(&w.admin)).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn pdf_survives_a_missing_logo() {
    let settings = Settings {
        logo_path: Some("/nonexistent/logo.jpg".into()),
        ..Settings::default()
    };
    let w = ward_with(settings).await;
    let created = w.create(&w.admin, patient("Juan Pérez")).await;
    let uri = format!("/api/imaging-requests/{}/generate_pdf", created["id"]);
    let response = w.app.send(Method::GET, &uri, Some(&w.admin), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn list_returns_every_request_unless_limited() {
    let w = ward().await;
    for i in 0..150 {
        let mut fields = ImagingRequestFields::new(format!("Paciente {:03}", i), "11.111.111-1");
        fields.doctor = Some(w.doctor.id);
        w.app.store.create_request(&fields, &[], None).await.unwrap();
    }

    let (_, body) = w.app.get("/api/imaging-requests", Some(&w.admin)).await;
    assert_eq!(body["meta"]["count"], 150);
    assert_eq!(body["data"].as_array().unwrap().len(), 150);

    let (_, body) = w.app.get("/api/imaging-requests", Some(&w.doctor_token)).await;
    assert_eq!(body["meta"]["count"], 150);

    let (_, body) = w.app.get("/api/imaging-requests?limit=20&offset=140", Some(&w.admin)).await;
    assert_eq!(body["meta"]["count"], 10);
    assert_eq!(body["data"][0]["patient_name"], "Paciente 140");
}
