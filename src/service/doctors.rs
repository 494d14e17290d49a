//! Doctor records, keyed by the owning user's id.

use super::users::DOCTOR_RULES;
use super::validation::{body_object, from_map, merge_onto, to_value, FieldRule, Format, Mode, RequestValidator};
use crate::auth::staff_or_owner;
use crate::error::{AppError, FieldErrors};
use crate::models::{Doctor, DoctorFields, User};
use crate::store::{Store, UserStore};
use serde_json::Value;

const USER_RULE: FieldRule = FieldRule::new("user").required().format(Format::Integer);

fn not_found(user_id: i64) -> AppError {
    AppError::NotFound(format!("doctor {}", user_id))
}

pub struct DoctorService;

impl DoctorService {
    pub async fn list(store: &dyn Store) -> Result<Vec<Doctor>, AppError> {
        store.list_doctors().await
    }

    pub async fn retrieve(store: &dyn Store, user_id: i64) -> Result<Doctor, AppError> {
        store.get_doctor(user_id).await?.ok_or_else(|| not_found(user_id))
    }

    /// Staff may register any user as a doctor; other callers only themselves.
    pub async fn create(store: &dyn Store, caller: &User, body: Value) -> Result<Doctor, AppError> {
        let mut body = body_object(body)?;
        RequestValidator::normalize(&mut body, &[USER_RULE]);
        RequestValidator::normalize(&mut body, DOCTOR_RULES);

        let mut errors = FieldErrors::new();
        RequestValidator::collect(&body, &[USER_RULE], Mode::Full, "", &mut errors);
        RequestValidator::collect(&body, DOCTOR_RULES, Mode::Full, "", &mut errors);
        errors.into_result()?;

        let user_id = body.get("user").and_then(Value::as_i64).unwrap_or_default();
        staff_or_owner(caller, user_id)?;
        body.remove("user");
        let fields: DoctorFields = from_map(body)?;
        let doctor = store.create_doctor(user_id, &fields).await?;
        tracing::info!(user_id, by = caller.id, "doctor created");
        Ok(doctor)
    }

    /// Supplied keys overwrite the stored record; the owning user cannot change.
    pub async fn update(store: &dyn Store, caller: &User, user_id: i64, body: Value, mode: Mode) -> Result<Doctor, AppError> {
        let existing = Self::retrieve(store, user_id).await?;
        staff_or_owner(caller, user_id)?;
        let mut body = body_object(body)?;
        RequestValidator::normalize(&mut body, &[USER_RULE]);
        RequestValidator::normalize(&mut body, DOCTOR_RULES);

        let mut errors = FieldErrors::new();
        RequestValidator::collect(&body, &[USER_RULE], mode, "", &mut errors);
        RequestValidator::collect(&body, DOCTOR_RULES, mode, "", &mut errors);
        if let Some(other) = body.get("user").and_then(Value::as_i64).filter(|u| *u != user_id) {
            errors.push("user", format!("Cannot move a doctor record to user {}.", other));
        }
        errors.into_result()?;

        body.remove("user");
        let fields: DoctorFields = from_map(merge_onto(to_value(&existing.fields), &body))?;
        let doctor = store
            .update_doctor(user_id, &fields)
            .await?
            .ok_or_else(|| not_found(user_id))?;
        tracing::info!(user_id, by = caller.id, "doctor updated");
        Ok(doctor)
    }

    /// Requests of the removed doctor keep their rows without a doctor.
    pub async fn delete(store: &dyn Store, caller: &User, user_id: i64) -> Result<(), AppError> {
        Self::retrieve(store, user_id).await?;
        staff_or_owner(caller, user_id)?;
        if !store.delete_doctor(user_id).await? {
            return Err(not_found(user_id));
        }
        tracing::info!(user_id, by = caller.id, "doctor deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewUser};
    use axum::http::StatusCode;
    use serde_json::json;

    async fn seed(store: &MemoryStore, name: &str, is_staff: bool) -> User {
        let new_user = NewUser {
            username: name.into(),
            email: String::new(),
            password_hash: None,
            is_staff,
            is_active: true,
        };
        store.create_user(&new_user, None, None).await.unwrap().user
    }

    #[tokio::test]
    async fn owner_registers_self_but_not_others() {
        let store = MemoryStore::new();
        let ana = seed(&store, "ana", false).await;
        let beto = seed(&store, "beto", false).await;

        let doc = DoctorService::create(&store, &ana, json!({"user": ana.id, "full_name": "Ana Rojas"}))
            .await
            .unwrap();
        assert_eq!(doc.user, ana.id);

        let err = DoctorService::create(&store, &ana, json!({"user": beto.id})).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn create_reports_missing_user_and_duplicates() {
        let store = MemoryStore::new();
        let admin = seed(&store, "admin", true).await;
        let err = DoctorService::create(&store, &admin, json!({"full_name": "x"})).await.unwrap_err();
        match err {
            AppError::Validation(e) => assert_eq!(e.get("user").unwrap()[0], "This field is required."),
            other => panic!("unexpected {:?}", other),
        }

        let err = DoctorService::create(&store, &admin, json!({"user": 999})).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        DoctorService::create(&store, &admin, json!({"user": admin.id})).await.unwrap();
        let err = DoctorService::create(&store, &admin, json!({"user": admin.id})).await.unwrap_err();
        match err {
            AppError::Validation(e) => assert!(e.get("user").is_some()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn patch_overlays_supplied_keys() {
        let store = MemoryStore::new();
        let admin = seed(&store, "admin", true).await;
        DoctorService::create(
            &store,
            &admin,
            json!({"user": admin.id, "full_name": "Luis Soto", "specialty": "Radiología"}),
        )
        .await
        .unwrap();
        let doc = DoctorService::update(&store, &admin, admin.id, json!({"phone_number": "+56911112222"}), Mode::Partial)
            .await
            .unwrap();
        assert_eq!(doc.fields.specialty.as_deref(), Some("Radiología"));
        assert_eq!(doc.fields.phone_number.as_deref(), Some("+56911112222"));

        let err = DoctorService::update(&store, &admin, admin.id, json!({"full_name": "x"}), Mode::Full)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
