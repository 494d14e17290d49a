//! Staff identities and their optional profile and doctor extensions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ProfileFields {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: ProfileFields,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct DoctorFields {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub medical_license: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Doctor {
    /// The owning user's id; doctors have no id of their own.
    #[sqlx(rename = "user_id")]
    pub user: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: DoctorFields,
}

impl Doctor {
    /// Name printed on requests and reports.
    pub fn display_name(&self) -> &str {
        self.fields
            .full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("N/A")
    }
}

/// A user together with whatever sub-records exist.
#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub user: User,
    pub profile: Option<UserProfile>,
    pub doctor: Option<Doctor>,
}

/// Serialized user as returned by the users endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub userprofile: Option<ProfileFields>,
    pub doctor: Option<DoctorFields>,
    pub es_doctor: bool,
}

impl From<&UserRecord> for UserView {
    fn from(record: &UserRecord) -> Self {
        UserView {
            id: record.user.id,
            username: record.user.username.clone(),
            email: record.user.email.clone(),
            is_staff: record.user.is_staff,
            userprofile: record.profile.as_ref().map(|p| p.fields.clone()),
            doctor: record.doctor.as_ref().map(|d| d.fields.clone()),
            es_doctor: record.doctor.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            password_hash: Some("secret-hash".into()),
            is_staff: false,
            is_active: true,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn view_reports_doctor_flag() {
        let mut record = UserRecord { user: user(1), profile: None, doctor: None };
        let view = UserView::from(&record);
        assert!(!view.es_doctor);
        assert!(view.doctor.is_none());

        record.doctor = Some(Doctor {
            user: 1,
            fields: DoctorFields { full_name: Some("Ana Rojas".into()), ..Default::default() },
        });
        let view = UserView::from(&record);
        assert!(view.es_doctor);
        assert_eq!(view.doctor.unwrap().full_name.as_deref(), Some("Ana Rojas"));
    }

    #[test]
    fn password_hash_never_serialized() {
        let v = serde_json::to_value(user(2)).unwrap();
        assert!(v.get("password_hash").is_none());
    }

    #[test]
    fn doctor_display_name_falls_back() {
        let d = Doctor { user: 3, fields: DoctorFields::default() };
        assert_eq!(d.display_name(), "N/A");
        let d = Doctor {
            user: 3,
            fields: DoctorFields { full_name: Some("  ".into()), ..Default::default() },
        };
        assert_eq!(d.display_name(), "N/A");
    }
}
