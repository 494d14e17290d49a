//! Two-level exam catalog: categories and the exam items inside them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExamCategoryFields {
    pub name: String,
    #[serde(default)]
    pub order: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ExamCategory {
    pub id: i64,
    pub name: String,
    pub order: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExamItemFields {
    /// Category id.
    pub category: i64,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ExamItem {
    pub id: i64,
    #[sqlx(rename = "category_id")]
    pub category: i64,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ExamItemView {
    #[serde(flatten)]
    pub item: ExamItem,
    pub category_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ExamCategoryView {
    #[serde(flatten)]
    pub category: ExamCategory,
    pub exam_items: Vec<ExamItemView>,
}

/// Catalog ordering: categories by (order, name), items by name.
pub fn sort_categories(categories: &mut [ExamCategory]) {
    categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
}

pub fn sort_items(items: &mut [ExamItem]) {
    items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Nest items under their categories, preserving catalog order.
pub fn nest_catalog(categories: Vec<ExamCategory>, items: &[ExamItem]) -> Vec<ExamCategoryView> {
    categories
        .into_iter()
        .map(|category| {
            let exam_items = items
                .iter()
                .filter(|i| i.category == category.id)
                .map(|i| ExamItemView {
                    item: i.clone(),
                    category_name: category.name.clone(),
                })
                .collect();
            ExamCategoryView { category, exam_items }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, category: i64, name: &str) -> ExamItem {
        ExamItem {
            id,
            category,
            name: name.into(),
            code: format!("04 01 {:03}", id),
            description: None,
        }
    }

    #[test]
    fn categories_sort_by_order_then_name() {
        let mut cats = vec![
            ExamCategory { id: 1, name: "TAC".into(), order: 2 },
            ExamCategory { id: 2, name: "Radiología".into(), order: 1 },
            ExamCategory { id: 3, name: "Ecografía".into(), order: 2 },
        ];
        sort_categories(&mut cats);
        let names: Vec<_> = cats.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Radiología", "Ecografía", "TAC"]);
    }

    #[test]
    fn nest_groups_items_with_category_name() {
        let cats = vec![
            ExamCategory { id: 1, name: "Radiología".into(), order: 1 },
            ExamCategory { id: 2, name: "Ecografía".into(), order: 2 },
        ];
        let items = vec![item(10, 1, "Tórax AP/L"), item(11, 2, "Abdomen"), item(12, 1, "Cráneo")];
        let nested = nest_catalog(cats, &items);
        assert_eq!(nested[0].exam_items.len(), 2);
        assert_eq!(nested[1].exam_items[0].category_name, "Ecografía");

        let v = serde_json::to_value(&nested[1]).unwrap();
        assert_eq!(v["name"], "Ecografía");
        assert_eq!(v["exam_items"][0]["category"], 2);
        assert_eq!(v["exam_items"][0]["category_name"], "Ecografía");
    }
}
