//! PostgreSQL-backed store. Runtime queries only; every multi-row write runs in one transaction.

mod assets;
mod exams;
mod imaging;
mod users;

use super::{conflict, Store, StoreResult};
use crate::error::{AppError, NON_FIELD_ERRORS};
use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn constraint violations into the same field errors the in-memory store reports.
pub(crate) fn map_db_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        let by_constraint = match db.constraint() {
            Some("assets_asset_id_key") => Some(conflict::asset_id()),
            Some("users_username_key") => Some(conflict::username()),
            Some("doctors_medical_license_key") => Some(conflict::medical_license()),
            Some("doctors_pkey") => Some(conflict::doctor_exists()),
            Some("exam_categories_name_key") => Some(conflict::category_name()),
            Some("exam_items_code_key") => Some(conflict::item_code()),
            _ => None,
        };
        if let Some(err) = by_constraint {
            return err;
        }
        if let ErrorKind::ForeignKeyViolation = db.kind() {
            return AppError::field(NON_FIELD_ERRORS, "Referenced object does not exist.");
        }
    }
    AppError::Db(e)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
