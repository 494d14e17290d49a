//! Username/password login issuing an API token.

use super::validation::{body_object, FieldRule, Mode, RequestValidator};
use crate::auth::password::check_login_password_off_thread;
use crate::auth::token::{digest, generate_key};
use crate::error::{AppError, NON_FIELD_ERRORS};
use crate::models::ProfileFields;
use crate::store::{Store, TokenStore, UserStore};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

pub const BAD_CREDENTIALS: &str = "Usuario o contraseña incorrectos.";
pub const INACTIVE_ACCOUNT: &str = "La cuenta de usuario está inactiva.";

const LOGIN_RULES: &[FieldRule] = &[
    FieldRule::new("username").required(),
    FieldRule::new("password").required(),
];

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub username_field: String,
    pub email: String,
    pub is_staff: bool,
    pub user_profile: Option<ProfileFields>,
}

pub struct AuthService;

impl AuthService {
    /// Checks the credentials, rotates the caller's token and stamps the profile's last login.
    pub async fn login(store: &dyn Store, body: Value) -> Result<LoginResponse, AppError> {
        let body = body_object(body)?;
        RequestValidator::validate(&body, LOGIN_RULES, Mode::Full)?;
        let username = body.get("username").and_then(Value::as_str).unwrap_or_default();
        let password = body.get("password").and_then(Value::as_str).unwrap_or_default();

        let found = store.find_user_by_username(username).await?;
        let verified = match &found {
            Some(user) => check_login_password_off_thread(password.to_owned(), user.password_hash.clone()).await?,
            None => false,
        };
        let user = match found {
            Some(user) if verified => user,
            _ => {
                tracing::info!(username, "login rejected");
                return Err(AppError::field(NON_FIELD_ERRORS, BAD_CREDENTIALS));
            }
        };
        if !user.is_active {
            return Err(AppError::field(NON_FIELD_ERRORS, INACTIVE_ACCOUNT));
        }

        let key = generate_key();
        store.replace_token(user.id, &digest(&key)).await?;
        store.record_login(user.id, Utc::now()).await?;
        let profile = store.get_user(user.id).await?.and_then(|r| r.profile).map(|p| p.fields);
        tracing::info!(user_id = user.id, "login");

        Ok(LoginResponse {
            token: key,
            user_id: user.id,
            username_field: user.username,
            email: user.email,
            is_staff: user.is_staff,
            user_profile: profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::store::{MemoryStore, NewUser};
    use serde_json::json;

    async fn seed(store: &MemoryStore, name: &str, password: &str, is_active: bool) -> i64 {
        let new_user = NewUser {
            username: name.into(),
            email: format!("{}@hospital.cl", name),
            password_hash: Some(hash_password(password).unwrap()),
            is_staff: false,
            is_active,
        };
        let profile = ProfileFields { full_name: Some("Ana Rojas".into()), ..Default::default() };
        store.create_user(&new_user, Some(&profile), None).await.unwrap().user.id
    }

    fn non_field(err: AppError) -> String {
        match err {
            AppError::Validation(e) => e.get(NON_FIELD_ERRORS).unwrap()[0].clone(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_rotates_token_and_stamps_profile() {
        let store = MemoryStore::new();
        let id = seed(&store, "ana", "clave123", true).await;

        let first = AuthService::login(&store, json!({"username": "ana", "password": "clave123"}))
            .await
            .unwrap();
        assert_eq!(first.token.len(), 40);
        assert_eq!(first.user_id, id);
        assert_eq!(first.user_profile.as_ref().unwrap().full_name.as_deref(), Some("Ana Rojas"));
        assert!(store.user_for_token(&digest(&first.token)).await.unwrap().is_some());

        let second = AuthService::login(&store, json!({"username": "ana", "password": "clave123"}))
            .await
            .unwrap();
        assert_ne!(first.token, second.token);
        assert!(store.user_for_token(&digest(&first.token)).await.unwrap().is_none());

        let record = store.get_user(id).await.unwrap().unwrap();
        assert!(record.profile.unwrap().last_login_at.is_some());
    }

    #[tokio::test]
    async fn bad_credentials_and_inactive_accounts() {
        let store = MemoryStore::new();
        seed(&store, "ana", "clave123", true).await;
        seed(&store, "old", "clave123", false).await;

        let err = AuthService::login(&store, json!({"username": "ana", "password": "nope"})).await.unwrap_err();
        assert_eq!(non_field(err), BAD_CREDENTIALS);
        let err = AuthService::login(&store, json!({"username": "ghost", "password": "x"})).await.unwrap_err();
        assert_eq!(non_field(err), BAD_CREDENTIALS);
        let err = AuthService::login(&store, json!({"username": "old", "password": "clave123"})).await.unwrap_err();
        assert_eq!(non_field(err), INACTIVE_ACCOUNT);

        match AuthService::login(&store, json!({"username": "ana"})).await.unwrap_err() {
            AppError::Validation(e) => assert_eq!(e.get("password").unwrap()[0], "This field is required."),
            other => panic!("unexpected {:?}", other),
        }
    }
}
