//! Exam catalog maintenance: loading the catalog file and repairing mis-encoded names.

use crate::error::AppError;
use crate::models::{ExamCategoryFields, ExamItemFields};
use crate::store::{ExamStore, Store};
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CatalogCategory {
    pub name: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub categories: usize,
    pub items: usize,
}

pub fn parse(json: &str) -> Result<Vec<CatalogCategory>, AppError> {
    serde_json::from_str(json).map_err(|e| AppError::BadRequest(format!("catalog file: {}", e)))
}

/// Get-or-create every category by name and every item by code. Existing rows take the
/// file's order, name, description and category. Returns how many rows were written.
pub async fn seed(store: &dyn Store, catalog: &[CatalogCategory]) -> Result<CatalogCounts, AppError> {
    let mut counts = CatalogCounts::default();
    for entry in catalog {
        let category = store.upsert_category_by_name(entry.name.trim(), entry.order).await?;
        counts.categories += 1;
        for item in &entry.items {
            let fields = ExamItemFields {
                category: category.id,
                name: item.name.trim().to_string(),
                code: item.code.trim().to_string(),
                description: item.description.as_deref().map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
            };
            let saved = store.upsert_item_by_code(&fields).await?;
            tracing::debug!(code = %saved.code, category = %category.name, "catalog item saved");
            counts.items += 1;
        }
    }
    tracing::info!(categories = counts.categories, items = counts.items, "exam catalog seeded");
    Ok(counts)
}

// Known whole-word damage, fixed before the per-character pass.
const PHRASES: &[(&str, &str)] = &[
    ("AngiografÝa de encÚfalo", "Angiografía de encéfalo"),
    ("Hombro, fÚmur", "Hombro, fémur"),
    ("MusculoesquelÚtico", "Musculoesquelético"),
    ("Tínel", "Túnel"),
    ("perifÚrica", "periférica"),
    ("PÚlvica", "Pélvica"),
    ("T¾rax", "Tórax"),
];

// Characters produced by reading CP850 bytes as Latin-1.
const CHARACTERS: &[(char, char)] = &[
    ('┴', 'Á'),
    ('Ë', 'É'),
    ('═', 'Í'),
    ('╔', 'É'),
    ('ß', 'á'),
    ('è', 'á'),
    ('ì', 'í'),
    ('î', 'í'),
    ('·', 'í'),
    ('Ý', 'í'),
    ('ò', 'ó'),
    ('¾', 'ó'),
    ('ù', 'ú'),
    ('»', 'ú'),
    ('±', 'ñ'),
    ('æ', 'ä'),
    ('Æ', 'Ä'),
    ('°', 'º'),
];

pub fn repair_text(text: &str) -> String {
    let mut out = text.to_string();
    for (bad, good) in PHRASES {
        out = out.replace(bad, good);
    }
    let chars: Vec<char> = out.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            // a capital Ú inside a lowercase word stands for é
            if c == 'Ú' && i > 0 && chars[i - 1].is_lowercase() {
                return 'é';
            }
            CHARACTERS.iter().find(|(bad, _)| *bad == c).map_or(c, |(_, good)| *good)
        })
        .collect()
}

/// Rewrite category and item names that `repair_text` changes.
pub async fn repair(store: &dyn Store) -> Result<CatalogCounts, AppError> {
    let mut counts = CatalogCounts::default();
    for category in store.list_categories().await? {
        let name = repair_text(&category.name);
        if name != category.name {
            tracing::info!(from = %category.name, to = %name, "repairing category name");
            store
                .update_category(category.id, &ExamCategoryFields { name, order: category.order })
                .await?;
            counts.categories += 1;
        }
    }
    for item in store.list_items(None).await? {
        let name = repair_text(&item.name);
        if name != item.name {
            tracing::info!(code = %item.code, from = %item.name, to = %name, "repairing item name");
            let fields = ExamItemFields {
                category: item.category,
                name,
                code: item.code.clone(),
                description: item.description.clone(),
            };
            store.update_item(item.id, &fields).await?;
            counts.items += 1;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;

    const SHIPPED: &str = include_str!("../data/exam_catalog.json");

    #[test]
    fn repairs_known_damage() {
        assert_eq!(repair_text("T¾rax AP/L"), "Tórax AP/L");
        assert_eq!(repair_text("AngiografÝa de encÚfalo"), "Angiografía de encéfalo");
        assert_eq!(repair_text("Ecotomograf·a ni±os"), "Ecotomografía niños");
        assert_eq!(repair_text("┴rea cardiaca"), "Área cardiaca");
        assert_eq!(repair_text("Cadera cÚlula"), "Cadera célula");
        assert_eq!(repair_text("ÚLTIMO CONTROL"), "ÚLTIMO CONTROL");
        assert_eq!(repair_text("Tórax"), "Tórax");
    }

    #[tokio::test]
    async fn shipped_catalog_seeds_and_is_idempotent() {
        let catalog = parse(SHIPPED).unwrap();
        assert!(!catalog.is_empty());
        let codes: HashSet<&str> = catalog
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.code.trim()))
            .collect();

        let store = MemoryStore::new();
        seed(&store, &catalog).await.unwrap();
        seed(&store, &catalog).await.unwrap();
        assert_eq!(store.list_categories().await.unwrap().len(), catalog.len());
        assert_eq!(store.list_items(None).await.unwrap().len(), codes.len());
    }

    #[tokio::test]
    async fn seeding_updates_existing_rows() {
        let store = MemoryStore::new();
        let first = parse(r#"[{"name": "TAC", "order": 5, "items": [{"name": "Torax", "code": "04 03 013", "description": ""}]}]"#)
            .unwrap();
        seed(&store, &first).await.unwrap();
        let second = parse(r#"[{"name": "TAC", "order": 2, "items": [{"name": "Tórax", "code": "04 03 013", "description": "con contraste"}]}]"#)
            .unwrap();
        let counts = seed(&store, &second).await.unwrap();
        assert_eq!(counts, CatalogCounts { categories: 1, items: 1 });

        let categories = store.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].order, 2);
        let items = store.list_items(None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Tórax");
        assert_eq!(items[0].description.as_deref(), Some("con contraste"));
    }

    #[tokio::test]
    async fn repair_rewrites_only_damaged_names() {
        let store = MemoryStore::new();
        let catalog = parse(
            r#"[{"name": "EX┴MENES", "order": 1, "items": [
                {"name": "T¾rax", "code": "1"},
                {"name": "Abdomen", "code": "2"}
            ]}]"#,
        )
        .unwrap();
        seed(&store, &catalog).await.unwrap();
        let counts = repair(&store).await.unwrap();
        assert_eq!(counts, CatalogCounts { categories: 1, items: 1 });
        assert_eq!(store.list_categories().await.unwrap()[0].name, "EXÁMENES");
        let names: Vec<String> = store.list_items(None).await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["Abdomen", "Tórax"]);
        assert_eq!(repair(&store).await.unwrap(), CatalogCounts::default());
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(parse("{not json").is_err());
    }
}
