use super::{map_db_error, PgStore};
use crate::models::{Doctor, DoctorFields, ProfileFields, User, UserProfile, UserRecord};
use crate::store::{conflict, NewUser, StoreResult, SubRecord, TokenStore, UserChanges, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::collections::HashMap;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_staff, is_active, date_joined";
const PROFILE_COLUMNS: &str = "user_id, full_name, position, area, phone_number, location, last_login_at";
const DOCTOR_COLUMNS: &str = "user_id, full_name, specialty, medical_license, phone_number";

async fn upsert_profile(conn: &mut PgConnection, user_id: i64, f: &ProfileFields) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO user_profiles (user_id, full_name, position, area, phone_number, location) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (user_id) DO UPDATE SET full_name = EXCLUDED.full_name, \
         position = EXCLUDED.position, area = EXCLUDED.area, \
         phone_number = EXCLUDED.phone_number, location = EXCLUDED.location",
    )
    .bind(user_id)
    .bind(&f.full_name)
    .bind(&f.position)
    .bind(&f.area)
    .bind(&f.phone_number)
    .bind(&f.location)
    .execute(conn)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

async fn upsert_doctor(conn: &mut PgConnection, user_id: i64, f: &DoctorFields) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO doctors (user_id, full_name, specialty, medical_license, phone_number) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (user_id) DO UPDATE SET full_name = EXCLUDED.full_name, \
         specialty = EXCLUDED.specialty, medical_license = EXCLUDED.medical_license, \
         phone_number = EXCLUDED.phone_number",
    )
    .bind(user_id)
    .bind(&f.full_name)
    .bind(&f.specialty)
    .bind(&f.medical_license)
    .bind(&f.phone_number)
    .execute(conn)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

impl PgStore {
    async fn load_record(&self, user: User) -> StoreResult<UserRecord> {
        let profile: Option<UserProfile> =
            sqlx::query_as(&format!("SELECT {} FROM user_profiles WHERE user_id = $1", PROFILE_COLUMNS))
                .bind(user.id)
                .fetch_optional(&self.pool)
                .await?;
        let doctor: Option<Doctor> =
            sqlx::query_as(&format!("SELECT {} FROM doctors WHERE user_id = $1", DOCTOR_COLUMNS))
                .bind(user.id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(UserRecord { user, profile, doctor })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let users: Vec<User> = sqlx::query_as(&format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        let profiles: Vec<UserProfile> = sqlx::query_as(&format!("SELECT {} FROM user_profiles", PROFILE_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        let doctors: Vec<Doctor> = sqlx::query_as(&format!("SELECT {} FROM doctors", DOCTOR_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        let mut profiles: HashMap<i64, UserProfile> = profiles.into_iter().map(|p| (p.user_id, p)).collect();
        let mut doctors: HashMap<i64, Doctor> = doctors.into_iter().map(|d| (d.user, d)).collect();
        Ok(users
            .into_iter()
            .map(|user| UserRecord {
                profile: profiles.remove(&user.id),
                doctor: doctors.remove(&user.id),
                user,
            })
            .collect())
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        let user: Option<User> = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match user {
            Some(user) => Ok(Some(self.load_record(user).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(
        &self,
        user: &NewUser,
        profile: Option<&ProfileFields>,
        doctor: Option<&DoctorFields>,
    ) -> StoreResult<UserRecord> {
        let mut tx = self.pool.begin().await?;
        let created: User = sqlx::query_as(&format!(
            "INSERT INTO users (username, email, password_hash, is_staff, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .bind(user.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;
        if let Some(fields) = profile {
            upsert_profile(&mut tx, created.id, fields).await?;
        }
        if let Some(fields) = doctor {
            upsert_doctor(&mut tx, created.id, fields).await?;
        }
        tx.commit().await?;
        tracing::info!(user_id = created.id, username = %created.username, "user created");
        self.load_record(created).await
    }

    async fn update_user(
        &self,
        id: i64,
        changes: &UserChanges,
        profile: &SubRecord<ProfileFields>,
        doctor: &SubRecord<DoctorFields>,
    ) -> StoreResult<Option<UserRecord>> {
        let mut tx = self.pool.begin().await?;
        let updated: Option<User> = sqlx::query_as(&format!(
            "UPDATE users SET username = $1, email = $2, is_staff = $3, is_active = $4, \
             password_hash = COALESCE($5, password_hash) WHERE id = $6 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(changes.is_staff)
        .bind(changes.is_active)
        .bind(&changes.password_hash)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;
        let Some(updated) = updated else {
            return Ok(None);
        };

        match profile {
            SubRecord::Keep => {}
            SubRecord::Upsert(fields) => upsert_profile(&mut tx, id, fields).await?,
            SubRecord::Remove => {
                sqlx::query("DELETE FROM user_profiles WHERE user_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        match doctor {
            SubRecord::Keep => {}
            SubRecord::Upsert(fields) => upsert_doctor(&mut tx, id, fields).await?,
            SubRecord::Remove => {
                sqlx::query("DELETE FROM doctors WHERE user_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(Some(self.load_record(updated).await?))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE user_profiles SET last_login_at = $1 WHERE user_id = $2")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        let doctors = sqlx::query_as(&format!("SELECT {} FROM doctors ORDER BY user_id", DOCTOR_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(doctors)
    }

    async fn get_doctor(&self, user_id: i64) -> StoreResult<Option<Doctor>> {
        let doctor = sqlx::query_as(&format!("SELECT {} FROM doctors WHERE user_id = $1", DOCTOR_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doctor)
    }

    async fn create_doctor(&self, user_id: i64, fields: &DoctorFields) -> StoreResult<Doctor> {
        let user_exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        if !user_exists.0 {
            return Err(conflict::missing("user", user_id));
        }
        let doctor = sqlx::query_as(&format!(
            "INSERT INTO doctors (user_id, full_name, specialty, medical_license, phone_number) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            DOCTOR_COLUMNS
        ))
        .bind(user_id)
        .bind(&fields.full_name)
        .bind(&fields.specialty)
        .bind(&fields.medical_license)
        .bind(&fields.phone_number)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(doctor)
    }

    async fn update_doctor(&self, user_id: i64, fields: &DoctorFields) -> StoreResult<Option<Doctor>> {
        let doctor = sqlx::query_as(&format!(
            "UPDATE doctors SET full_name = $1, specialty = $2, medical_license = $3, phone_number = $4 \
             WHERE user_id = $5 RETURNING {}",
            DOCTOR_COLUMNS
        ))
        .bind(&fields.full_name)
        .bind(&fields.specialty)
        .bind(&fields.medical_license)
        .bind(&fields.phone_number)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(doctor)
    }

    async fn delete_doctor(&self, user_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM doctors WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn replace_token(&self, user_id: i64, digest: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO auth_tokens (user_id, digest) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET digest = EXCLUDED.digest, created_at = NOW()",
        )
        .bind(user_id)
        .bind(digest)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_for_token(&self, digest: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            "SELECT u.id, u.username, u.email, u.password_hash, u.is_staff, u.is_active, u.date_joined \
             FROM users u JOIN auth_tokens t ON t.user_id = u.id WHERE t.digest = $1",
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
