use super::{map_db_error, PgStore};
use crate::models::{ExamCategory, ExamCategoryFields, ExamItem, ExamItemFields};
use crate::store::{conflict, ExamStore, StoreResult};
use async_trait::async_trait;

const CATEGORY_COLUMNS: &str = r#"id, name, "order""#;
const ITEM_COLUMNS: &str = "id, category_id, name, code, description";

impl PgStore {
    async fn ensure_category(&self, id: i64) -> StoreResult<()> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM exam_categories WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if exists.0 {
            Ok(())
        } else {
            Err(conflict::missing("category", id))
        }
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn list_categories(&self) -> StoreResult<Vec<ExamCategory>> {
        let rows = sqlx::query_as(&format!(
            r#"SELECT {} FROM exam_categories ORDER BY "order", name"#,
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_category(&self, id: i64) -> StoreResult<Option<ExamCategory>> {
        let row = sqlx::query_as(&format!("SELECT {} FROM exam_categories WHERE id = $1", CATEGORY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_category(&self, fields: &ExamCategoryFields) -> StoreResult<ExamCategory> {
        let row = sqlx::query_as(&format!(
            r#"INSERT INTO exam_categories (name, "order") VALUES ($1, $2) RETURNING {}"#,
            CATEGORY_COLUMNS
        ))
        .bind(&fields.name)
        .bind(fields.order)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row)
    }

    async fn update_category(&self, id: i64, fields: &ExamCategoryFields) -> StoreResult<Option<ExamCategory>> {
        let row = sqlx::query_as(&format!(
            r#"UPDATE exam_categories SET name = $1, "order" = $2 WHERE id = $3 RETURNING {}"#,
            CATEGORY_COLUMNS
        ))
        .bind(&fields.name)
        .bind(fields.order)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row)
    }

    async fn delete_category(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM exam_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_category_by_name(&self, name: &str, order: i32) -> StoreResult<ExamCategory> {
        let row = sqlx::query_as(&format!(
            r#"INSERT INTO exam_categories (name, "order") VALUES ($1, $2)
               ON CONFLICT (name) DO UPDATE SET "order" = EXCLUDED."order" RETURNING {}"#,
            CATEGORY_COLUMNS
        ))
        .bind(name)
        .bind(order)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_items(&self, category: Option<i64>) -> StoreResult<Vec<ExamItem>> {
        let rows = match category {
            Some(c) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM exam_items WHERE category_id = $1 ORDER BY name, id",
                    ITEM_COLUMNS
                ))
                .bind(c)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!("SELECT {} FROM exam_items ORDER BY name, id", ITEM_COLUMNS))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn get_item(&self, id: i64) -> StoreResult<Option<ExamItem>> {
        let row = sqlx::query_as(&format!("SELECT {} FROM exam_items WHERE id = $1", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn items_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<ExamItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as(&format!("SELECT {} FROM exam_items WHERE id = ANY($1) ORDER BY id", ITEM_COLUMNS))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_item(&self, fields: &ExamItemFields) -> StoreResult<ExamItem> {
        self.ensure_category(fields.category).await?;
        let row = sqlx::query_as(&format!(
            "INSERT INTO exam_items (category_id, name, code, description) VALUES ($1, $2, $3, $4) RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(fields.category)
        .bind(&fields.name)
        .bind(&fields.code)
        .bind(&fields.description)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row)
    }

    async fn update_item(&self, id: i64, fields: &ExamItemFields) -> StoreResult<Option<ExamItem>> {
        self.ensure_category(fields.category).await?;
        let row = sqlx::query_as(&format!(
            "UPDATE exam_items SET category_id = $1, name = $2, code = $3, description = $4 \
             WHERE id = $5 RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(fields.category)
        .bind(&fields.name)
        .bind(&fields.code)
        .bind(&fields.description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row)
    }

    async fn delete_item(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM exam_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_item_by_code(&self, fields: &ExamItemFields) -> StoreResult<ExamItem> {
        self.ensure_category(fields.category).await?;
        let row = sqlx::query_as(&format!(
            "INSERT INTO exam_items (category_id, name, code, description) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (code) DO UPDATE SET category_id = EXCLUDED.category_id, \
             name = EXCLUDED.name, description = EXCLUDED.description RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(fields.category)
        .bind(&fields.name)
        .bind(&fields.code)
        .bind(&fields.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
