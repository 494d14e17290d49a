//! User accounts with their optional profile and doctor records.

use super::merge::{self, Nested};
use super::validation::{body_object, FieldRule, Format, Mode, RequestValidator};
use crate::auth::password::hash_password_off_thread;
use crate::auth::{require_staff, staff_or_owner};
use crate::error::{AppError, FieldErrors};
use crate::models::{DoctorFields, ProfileFields, User, UserRecord, UserView};
use crate::store::{NewUser, Store, SubRecord, UserChanges, UserStore};
use serde_json::{Map, Value};

pub const USERNAME_MESSAGE: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

pub const USER_RULES: &[FieldRule] = &[
    FieldRule::new("username")
        .required()
        .max(150)
        .pattern(r"^[\w.@+-]+$", USERNAME_MESSAGE),
    FieldRule::new("email").format(Format::Email).blank().max(254),
    FieldRule::new("password").optional(),
    FieldRule::new("is_staff").format(Format::Boolean),
];

pub const PROFILE_RULES: &[FieldRule] = &[
    FieldRule::new("full_name").optional().max(255),
    FieldRule::new("position").optional().max(100),
    FieldRule::new("area").optional().max(100),
    FieldRule::new("phone_number").optional().max(20),
    FieldRule::new("location").optional().max(200),
];

pub const DOCTOR_RULES: &[FieldRule] = &[
    FieldRule::new("full_name").optional().max(255),
    FieldRule::new("specialty").optional().max(100),
    FieldRule::new("medical_license").blank_as_null().max(50),
    FieldRule::new("phone_number").optional().max(20),
];

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("user {}", id))
}

fn text<'a>(body: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

/// A non-empty password, hashed. Blank or missing passwords leave the account without one.
async fn password_hash(body: &Map<String, Value>) -> Result<Option<String>, AppError> {
    match text(body, "password").filter(|p| !p.is_empty()) {
        Some(p) => Ok(Some(hash_password_off_thread(p.to_owned()).await?)),
        None => Ok(None),
    }
}

pub struct UserService;

impl UserService {
    /// Staff see everyone; other callers only themselves.
    pub async fn list(store: &dyn Store, caller: &User) -> Result<Vec<UserView>, AppError> {
        let records = if caller.is_staff {
            store.list_users().await?
        } else {
            store.get_user(caller.id).await?.into_iter().collect()
        };
        Ok(records.iter().map(UserView::from).collect())
    }

    async fn visible(store: &dyn Store, caller: &User, id: i64) -> Result<UserRecord, AppError> {
        if !caller.is_staff && caller.id != id {
            return Err(not_found(id));
        }
        store.get_user(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn retrieve(store: &dyn Store, caller: &User, id: i64) -> Result<UserView, AppError> {
        Self::visible(store, caller, id).await.map(|r| UserView::from(&r))
    }

    pub async fn create(store: &dyn Store, caller: &User, body: Value) -> Result<UserView, AppError> {
        require_staff(caller)?;
        let mut body = body_object(body)?;
        RequestValidator::normalize(&mut body, USER_RULES);

        let mut errors = FieldErrors::new();
        RequestValidator::collect(&body, USER_RULES, Mode::Full, "", &mut errors);
        let profile = errors.absorb(
            Nested::read(&body, "userprofile")
                .and_then(|n| merge::on_create::<ProfileFields>("userprofile", n, PROFILE_RULES)),
        )?;
        let doctor = errors.absorb(
            Nested::read(&body, "doctor").and_then(|n| merge::on_create::<DoctorFields>("doctor", n, DOCTOR_RULES)),
        )?;
        errors.into_result()?;

        let new_user = NewUser {
            username: text(&body, "username").unwrap_or_default().to_string(),
            email: text(&body, "email").unwrap_or_default().to_string(),
            password_hash: password_hash(&body).await?,
            is_staff: body.get("is_staff").and_then(Value::as_bool).unwrap_or(false),
            is_active: true,
        };
        let record = store
            .create_user(&new_user, profile.flatten().as_ref(), doctor.flatten().as_ref())
            .await?;
        tracing::info!(user_id = record.user.id, username = %record.user.username, "user created");
        Ok(UserView::from(&record))
    }

    /// PUT (`Mode::Full`) or PATCH (`Mode::Partial`).
    pub async fn update(store: &dyn Store, caller: &User, id: i64, body: Value, mode: Mode) -> Result<UserView, AppError> {
        let existing = Self::visible(store, caller, id).await?;
        staff_or_owner(caller, id)?;
        let mut body = body_object(body)?;
        RequestValidator::normalize(&mut body, USER_RULES);

        let mut errors = FieldErrors::new();
        RequestValidator::collect(&body, USER_RULES, mode, "", &mut errors);
        let profile = errors.absorb(Nested::read(&body, "userprofile").and_then(|n| {
            merge::profile_on_update("userprofile", n, existing.profile.as_ref().map(|p| &p.fields), PROFILE_RULES)
        }))?;
        let doctor = errors.absorb(Nested::read(&body, "doctor").and_then(|n| {
            merge::doctor_on_update("doctor", n, mode, existing.doctor.as_ref().map(|d| &d.fields), DOCTOR_RULES)
        }))?;
        errors.into_result()?;

        let is_staff = body.get("is_staff").and_then(Value::as_bool).unwrap_or(existing.user.is_staff);
        if !caller.is_staff && is_staff != existing.user.is_staff {
            return Err(AppError::permission_denied());
        }
        let changes = UserChanges {
            username: text(&body, "username").unwrap_or(existing.user.username.as_str()).to_string(),
            email: text(&body, "email").unwrap_or(existing.user.email.as_str()).to_string(),
            is_staff,
            is_active: existing.user.is_active,
            password_hash: password_hash(&body).await?,
        };
        let profile = profile.unwrap_or(SubRecord::Keep);
        let doctor = doctor.unwrap_or(SubRecord::Keep);
        let record = store
            .update_user(id, &changes, &profile, &doctor)
            .await?
            .ok_or_else(|| not_found(id))?;
        tracing::info!(user_id = id, by = caller.id, "user updated");
        Ok(UserView::from(&record))
    }

    pub async fn delete(store: &dyn Store, caller: &User, id: i64) -> Result<(), AppError> {
        Self::visible(store, caller, id).await?;
        staff_or_owner(caller, id)?;
        if !store.delete_user(id).await? {
            return Err(not_found(id));
        }
        tracing::info!(user_id = id, by = caller.id, "user deleted");
        Ok(())
    }
}
