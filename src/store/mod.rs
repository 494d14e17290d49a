//! Storage traits. `PgStore` persists to PostgreSQL; `MemoryStore` keeps everything in
//! process for tests and throwaway dev servers. Both enforce the same uniqueness and
//! cascade rules so handlers behave identically on either.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::AppError;
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type StoreResult<T> = Result<T, AppError>;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Clamp optional paging values to the default/maximum window.
pub fn page_window(limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
    (limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT), offset.unwrap_or(0))
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetQuery {
    /// Every term must match at least one searchable column (case-insensitive substring).
    pub search_terms: Vec<String>,
    pub asset_type: Option<AssetType>,
    pub status: Option<String>,
    pub connectivity: Option<bool>,
    pub antivirus_enabled: Option<bool>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for AssetQuery {
    fn default() -> Self {
        AssetQuery {
            search_terms: Vec::new(),
            asset_type: None,
            status: None,
            connectivity: None,
            antivirus_enabled: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn list_assets(&self, query: &AssetQuery) -> StoreResult<Vec<Asset>>;
    async fn get_asset(&self, id: i64) -> StoreResult<Option<Asset>>;
    async fn create_asset(&self, fields: &AssetFields) -> StoreResult<Asset>;
    async fn update_asset(&self, id: i64, fields: &AssetFields) -> StoreResult<Option<Asset>>;
    async fn delete_asset(&self, id: i64) -> StoreResult<bool>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserChanges {
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
    /// `None` keeps the stored hash.
    pub password_hash: Option<String>,
}

/// What to do with a 1:1 sub-record during a user write.
#[derive(Clone, Debug, PartialEq)]
pub enum SubRecord<T> {
    Keep,
    /// Create when missing, otherwise overwrite with these values.
    Upsert(T),
    Remove,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// All users ordered by username.
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
    async fn get_user(&self, id: i64) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn create_user(
        &self,
        user: &NewUser,
        profile: Option<&ProfileFields>,
        doctor: Option<&DoctorFields>,
    ) -> StoreResult<UserRecord>;
    async fn update_user(
        &self,
        id: i64,
        changes: &UserChanges,
        profile: &SubRecord<ProfileFields>,
        doctor: &SubRecord<DoctorFields>,
    ) -> StoreResult<Option<UserRecord>>;
    /// Cascades profile, doctor and token; requests of a removed doctor lose their doctor.
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;
    /// Stamps `last_login_at` when the user has a profile.
    async fn record_login(&self, user_id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>>;
    async fn get_doctor(&self, user_id: i64) -> StoreResult<Option<Doctor>>;
    async fn create_doctor(&self, user_id: i64, fields: &DoctorFields) -> StoreResult<Doctor>;
    async fn update_doctor(&self, user_id: i64, fields: &DoctorFields) -> StoreResult<Option<Doctor>>;
    async fn delete_doctor(&self, user_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store the digest of a freshly issued token, replacing any previous one.
    async fn replace_token(&self, user_id: i64, digest: &str) -> StoreResult<()>;
    async fn user_for_token(&self, digest: &str) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn list_categories(&self) -> StoreResult<Vec<ExamCategory>>;
    async fn get_category(&self, id: i64) -> StoreResult<Option<ExamCategory>>;
    async fn create_category(&self, fields: &ExamCategoryFields) -> StoreResult<ExamCategory>;
    async fn update_category(&self, id: i64, fields: &ExamCategoryFields) -> StoreResult<Option<ExamCategory>>;
    /// Cascades to the category's items.
    async fn delete_category(&self, id: i64) -> StoreResult<bool>;
    /// Get-or-create by name; an existing category takes the new order.
    async fn upsert_category_by_name(&self, name: &str, order: i32) -> StoreResult<ExamCategory>;

    async fn list_items(&self, category: Option<i64>) -> StoreResult<Vec<ExamItem>>;
    async fn get_item(&self, id: i64) -> StoreResult<Option<ExamItem>>;
    async fn items_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<ExamItem>>;
    async fn create_item(&self, fields: &ExamItemFields) -> StoreResult<ExamItem>;
    async fn update_item(&self, id: i64, fields: &ExamItemFields) -> StoreResult<Option<ExamItem>>;
    /// Also drops the item from any request that selected it.
    async fn delete_item(&self, id: i64) -> StoreResult<bool>;
    /// Get-or-create by code; an existing item takes the new name, description and category.
    async fn upsert_item_by_code(&self, fields: &ExamItemFields) -> StoreResult<ExamItem>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestFilter {
    pub doctor: Option<i64>,
    pub include_deleted: bool,
    /// `None` returns every matching request.
    pub limit: Option<u32>,
    pub offset: u32,
}

#[async_trait]
pub trait ImagingStore: Send + Sync {
    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<ImagingRequest>>;
    /// Soft-deleted requests are returned too; callers decide visibility.
    async fn get_request(&self, id: i64) -> StoreResult<Option<ImagingRequest>>;
    async fn create_request(
        &self,
        fields: &ImagingRequestFields,
        exams: &[i64],
        actor: Option<i64>,
    ) -> StoreResult<ImagingRequest>;
    /// `exams: None` keeps the current selection.
    async fn update_request(
        &self,
        id: i64,
        fields: &ImagingRequestFields,
        exams: Option<&[i64]>,
        actor: Option<i64>,
    ) -> StoreResult<Option<ImagingRequest>>;
    async fn soft_delete_request(&self, id: i64, actor: Option<i64>) -> StoreResult<bool>;
    /// Newest first.
    async fn request_history(&self, id: i64) -> StoreResult<Vec<ImagingRequestHistory>>;
}

#[async_trait]
pub trait Store: AssetStore + UserStore + TokenStore + ExamStore + ImagingStore {
    /// Round trip to the backing storage, for readiness.
    async fn ping(&self) -> StoreResult<()>;
}

/// JSON snapshot of a request as stored in its history.
pub(crate) fn request_snapshot(request: &ImagingRequest) -> serde_json::Value {
    serde_json::to_value(request).unwrap_or(serde_json::Value::Null)
}

/// Messages for uniqueness conflicts, shared by both stores.
pub(crate) mod conflict {
    use crate::error::AppError;

    pub fn asset_id() -> AppError {
        AppError::field("asset_id", "asset with this asset id already exists.")
    }

    pub fn username() -> AppError {
        AppError::field("username", "A user with that username already exists.")
    }

    pub fn medical_license() -> AppError {
        AppError::field("medical_license", "doctor with this medical license already exists.")
    }

    pub fn doctor_exists() -> AppError {
        AppError::field("user", "doctor with this user already exists.")
    }

    pub fn category_name() -> AppError {
        AppError::field("name", "exam category with this name already exists.")
    }

    pub fn item_code() -> AppError {
        AppError::field("code", "exam item with this code already exists.")
    }

    pub fn missing(field: &str, id: i64) -> AppError {
        AppError::field(field, format!("Invalid pk \"{}\" - object does not exist.", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps() {
        assert_eq!(page_window(None, None), (DEFAULT_LIMIT, 0));
        assert_eq!(page_window(Some(5000), Some(20)), (MAX_LIMIT, 20));
        assert_eq!(page_window(Some(10), None), (10, 0));
    }
}
