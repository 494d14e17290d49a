//! Exam catalog: categories and the items inside them.

use super::validation::{body_object, from_map, merge_onto, to_value, FieldRule, Format, Mode, RequestValidator};
use crate::error::{AppError, FieldErrors};
use crate::models::{nest_catalog, ExamCategory, ExamCategoryFields, ExamCategoryView, ExamItem, ExamItemFields, ExamItemView, User};
use crate::store::{ExamStore, Store};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const CATEGORY_RULES: &[FieldRule] = &[
    FieldRule::new("name").required().max(100),
    FieldRule::new("order").format(Format::Integer),
];

pub const ITEM_RULES: &[FieldRule] = &[
    FieldRule::new("category").required().format(Format::Integer),
    FieldRule::new("name").required().max(255),
    FieldRule::new("code").required().max(20),
    FieldRule::new("description").optional(),
];

fn validated(body: Value, rules: &[FieldRule], mode: Mode) -> Result<Map<String, Value>, AppError> {
    let mut body = body_object(body)?;
    RequestValidator::normalize(&mut body, rules);
    let mut errors = FieldErrors::new();
    RequestValidator::collect(&body, rules, mode, "", &mut errors);
    errors.into_result()?;
    Ok(body)
}

pub struct ExamService;

impl ExamService {
    pub async fn list_categories(store: &dyn Store) -> Result<Vec<ExamCategoryView>, AppError> {
        let categories = store.list_categories().await?;
        let items = store.list_items(None).await?;
        Ok(nest_catalog(categories, &items))
    }

    async fn category_view(store: &dyn Store, category: ExamCategory) -> Result<ExamCategoryView, AppError> {
        let id = category.id;
        let items = store.list_items(Some(id)).await?;
        nest_catalog(vec![category], &items)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("exam category {}", id)))
    }

    pub async fn retrieve_category(store: &dyn Store, id: i64) -> Result<ExamCategoryView, AppError> {
        let category = store
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("exam category {}", id)))?;
        Self::category_view(store, category).await
    }

    pub async fn create_category(store: &dyn Store, caller: &User, body: Value) -> Result<ExamCategoryView, AppError> {
        let fields: ExamCategoryFields = from_map(validated(body, CATEGORY_RULES, Mode::Full)?)?;
        let category = store.create_category(&fields).await?;
        tracing::info!(id = category.id, name = %category.name, by = caller.id, "exam category created");
        Self::category_view(store, category).await
    }

    pub async fn update_category(
        store: &dyn Store,
        caller: &User,
        id: i64,
        body: Value,
        mode: Mode,
    ) -> Result<ExamCategoryView, AppError> {
        let existing = Self::retrieve_category(store, id).await?.category;
        let patch = validated(body, CATEGORY_RULES, mode)?;
        let base = ExamCategoryFields {
            name: existing.name,
            order: existing.order,
        };
        let fields: ExamCategoryFields = from_map(merge_onto(to_value(&base), &patch))?;
        let category = store
            .update_category(id, &fields)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("exam category {}", id)))?;
        tracing::info!(id, by = caller.id, "exam category updated");
        Self::category_view(store, category).await
    }

    /// Deletes the category's items too.
    pub async fn delete_category(store: &dyn Store, caller: &User, id: i64) -> Result<(), AppError> {
        if !store.delete_category(id).await? {
            return Err(AppError::NotFound(format!("exam category {}", id)));
        }
        tracing::info!(id, by = caller.id, "exam category deleted");
        Ok(())
    }

    /// `?category=<id>` narrows the list.
    pub async fn list_items(store: &dyn Store, params: &HashMap<String, String>) -> Result<Vec<ExamItemView>, AppError> {
        let category = match params.get("category") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::field("category", "A valid integer is required."))?,
            ),
            None => None,
        };
        let names: HashMap<i64, String> = store
            .list_categories()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let items = store.list_items(category).await?;
        Ok(items
            .into_iter()
            .map(|item| ExamItemView {
                category_name: names.get(&item.category).cloned().unwrap_or_default(),
                item,
            })
            .collect())
    }

    async fn item_view(store: &dyn Store, item: ExamItem) -> Result<ExamItemView, AppError> {
        let category_name = store
            .get_category(item.category)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();
        Ok(ExamItemView { item, category_name })
    }

    pub async fn retrieve_item(store: &dyn Store, id: i64) -> Result<ExamItemView, AppError> {
        let item = store
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("exam item {}", id)))?;
        Self::item_view(store, item).await
    }

    pub async fn create_item(store: &dyn Store, caller: &User, body: Value) -> Result<ExamItemView, AppError> {
        let fields: ExamItemFields = from_map(validated(body, ITEM_RULES, Mode::Full)?)?;
        let item = store.create_item(&fields).await?;
        tracing::info!(id = item.id, code = %item.code, by = caller.id, "exam item created");
        Self::item_view(store, item).await
    }

    pub async fn update_item(
        store: &dyn Store,
        caller: &User,
        id: i64,
        body: Value,
        mode: Mode,
    ) -> Result<ExamItemView, AppError> {
        let existing = Self::retrieve_item(store, id).await?.item;
        let patch = validated(body, ITEM_RULES, mode)?;
        let base = ExamItemFields {
            category: existing.category,
            name: existing.name,
            code: existing.code,
            description: existing.description,
        };
        let fields: ExamItemFields = from_map(merge_onto(to_value(&base), &patch))?;
        let item = store
            .update_item(id, &fields)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("exam item {}", id)))?;
        tracing::info!(id, by = caller.id, "exam item updated");
        Self::item_view(store, item).await
    }

    /// Also unlinks the item from every request that selected it.
    pub async fn delete_item(store: &dyn Store, caller: &User, id: i64) -> Result<(), AppError> {
        if !store.delete_item(id).await? {
            return Err(AppError::NotFound(format!("exam item {}", id)));
        }
        tracing::info!(id, by = caller.id, "exam item deleted");
        Ok(())
    }
}
