//! Shared helpers: an in-memory app, seeded accounts and a JSON request driver.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use clinic_admin::auth::password::hash_password;
use clinic_admin::auth::token::{digest, generate_key};
use clinic_admin::models::{DoctorFields, ProfileFields, User};
use clinic_admin::store::{NewUser, TokenStore, UserStore};
use clinic_admin::{AppState, MemoryStore, Settings, Store};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn Store> = store.clone();
        let state = AppState::new(shared, settings);
        let router = clinic_admin::app(state.clone());
        TestApp { store, state, router }
    }

    async fn insert_user(
        &self,
        username: &str,
        password: Option<&str>,
        is_staff: bool,
        profile: Option<ProfileFields>,
        doctor: Option<DoctorFields>,
    ) -> User {
        let new = NewUser {
            username: username.into(),
            email: format!("{}@hospital.cl", username),
            password_hash: password.map(|p| hash_password(p).unwrap()),
            is_staff,
            is_active: true,
        };
        self.store
            .create_user(&new, profile.as_ref(), doctor.as_ref())
            .await
            .unwrap()
            .user
    }

    /// Account with a real password, for login tests.
    pub async fn user_with_password(&self, username: &str, password: &str, is_staff: bool) -> User {
        let profile = ProfileFields {
            full_name: Some(format!("{} Pérez", username)),
            area: Some("Informática".into()),
            ..Default::default()
        };
        self.insert_user(username, Some(password), is_staff, Some(profile), None).await
    }

    pub async fn staff(&self, username: &str) -> User {
        self.insert_user(username, None, true, None, None).await
    }

    pub async fn plain(&self, username: &str) -> User {
        self.insert_user(username, None, false, None, None).await
    }

    pub async fn doctor(&self, username: &str, full_name: &str) -> User {
        let doctor = DoctorFields {
            full_name: Some(full_name.into()),
            specialty: Some("Radiología".into()),
            ..Default::default()
        };
        self.insert_user(username, None, false, None, Some(doctor)).await
    }

    /// Issue a token directly, skipping the password round trip.
    pub async fn token(&self, user: &User) -> String {
        let key = generate_key();
        self.store.replace_token(user.id, &digest(&key)).await.unwrap();
        key
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Status plus parsed JSON body (`Null` when empty).
    pub async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.json(Method::DELETE, uri, token, None).await
    }
}
