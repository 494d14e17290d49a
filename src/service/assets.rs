//! IT asset inventory.

use super::validation::{body_object, from_map, merge_onto, to_value, FieldRule, Format, Mode, RequestValidator};
use crate::error::{AppError, FieldErrors};
use crate::models::{Asset, AssetFields, AssetType, User, ASSET_TYPE_CHOICES};
use crate::store::{page_window, AssetQuery, AssetStore, Store};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const ASSET_RULES: &[FieldRule] = &[
    FieldRule::new("name").required().max(200),
    FieldRule::new("asset_id").required().max(50),
    FieldRule::new("asset_type").choices(ASSET_TYPE_CHOICES),
    FieldRule::new("description").optional(),
    FieldRule::new("status").max(50),
    FieldRule::new("connectivity").format(Format::Boolean),
    FieldRule::new("antivirus_enabled").format(Format::Boolean),
    FieldRule::new("purchase_date").format(Format::Date).blank_as_null(),
    FieldRule::new("warranty_expiry_date").format(Format::Date).blank_as_null(),
    FieldRule::new("contract_number").optional().max(100),
    FieldRule::new("location").optional().max(200),
    FieldRule::new("ip_address").format(Format::IpAddress).blank_as_null(),
    FieldRule::new("mac_address").optional().max(17),
    FieldRule::new("assigned_to").optional().max(100),
];

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("asset {}", id))
}

/// Search input is split on whitespace and commas; empty pieces are dropped.
pub fn search_terms(raw: &str) -> Vec<String> {
    raw.replace('\0', "")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AppError::field(key, "Must be a valid boolean.")),
    }
}

/// Query-string parameters for the asset list. Unknown keys are ignored.
pub fn parse_query(params: &HashMap<String, String>) -> Result<AssetQuery, AppError> {
    let mut query = AssetQuery::default();
    let mut limit = None;
    let mut offset = None;
    for (k, v) in params {
        match k.as_str() {
            "search" => query.search_terms = search_terms(v),
            "asset_type" => {
                let t = v.parse::<AssetType>().map_err(|m| AppError::field("asset_type", m))?;
                query.asset_type = Some(t);
            }
            "status" => query.status = Some(v.clone()),
            "connectivity" => query.connectivity = Some(parse_flag(k, v)?),
            "antivirus_enabled" => query.antivirus_enabled = Some(parse_flag(k, v)?),
            "limit" => limit = v.parse().ok(),
            "offset" => offset = v.parse().ok(),
            _ => {}
        }
    }
    (query.limit, query.offset) = page_window(limit, offset);
    Ok(query)
}

fn validated(body: Value, mode: Mode) -> Result<Map<String, Value>, AppError> {
    let mut body = body_object(body)?;
    RequestValidator::normalize(&mut body, ASSET_RULES);
    let mut errors = FieldErrors::new();
    RequestValidator::collect(&body, ASSET_RULES, mode, "", &mut errors);
    errors.into_result()?;
    Ok(body)
}

pub struct AssetService;

impl AssetService {
    pub async fn list(store: &dyn Store, params: &HashMap<String, String>) -> Result<Vec<Asset>, AppError> {
        let query = parse_query(params)?;
        store.list_assets(&query).await
    }

    pub async fn retrieve(store: &dyn Store, id: i64) -> Result<Asset, AppError> {
        store.get_asset(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn create(store: &dyn Store, caller: &User, body: Value) -> Result<Asset, AppError> {
        let fields: AssetFields = from_map(validated(body, Mode::Full)?)?;
        let asset = store.create_asset(&fields).await?;
        tracing::info!(id = asset.id, asset_id = %asset.fields.asset_id, by = caller.id, "asset created");
        Ok(asset)
    }

    /// Supplied keys overwrite the stored asset; PUT additionally requires `name` and `asset_id`.
    pub async fn update(store: &dyn Store, caller: &User, id: i64, body: Value, mode: Mode) -> Result<Asset, AppError> {
        let existing = Self::retrieve(store, id).await?;
        let patch = validated(body, mode)?;
        let fields: AssetFields = from_map(merge_onto(to_value(&existing.fields), &patch))?;
        let asset = store.update_asset(id, &fields).await?.ok_or_else(|| not_found(id))?;
        tracing::info!(id, by = caller.id, "asset updated");
        Ok(asset)
    }

    pub async fn delete(store: &dyn Store, caller: &User, id: i64) -> Result<(), AppError> {
        if !store.delete_asset(id).await? {
            return Err(not_found(id));
        }
        tracing::info!(id, by = caller.id, "asset deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewUser, UserStore, DEFAULT_LIMIT, MAX_LIMIT};
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn search_splits_on_whitespace_and_commas() {
        assert_eq!(search_terms("  pc, box3  sala"), ["pc", "box3", "sala"]);
        assert!(search_terms(" , ").is_empty());
    }

    #[test]
    fn query_parsing() {
        let q = parse_query(&params(&[
            ("search", "impresora"),
            ("asset_type", "printer"),
            ("connectivity", "false"),
            ("limit", "5000"),
            ("offset", "abc"),
            ("page", "2"),
        ]))
        .unwrap();
        assert_eq!(q.search_terms, ["impresora"]);
        assert_eq!(q.asset_type, Some(AssetType::Printer));
        assert_eq!(q.connectivity, Some(false));
        assert_eq!((q.limit, q.offset), (MAX_LIMIT, 0));

        assert_eq!(parse_query(&params(&[])).unwrap().limit, DEFAULT_LIMIT);
        assert!(parse_query(&params(&[("asset_type", "laptop")])).is_err());
        assert!(parse_query(&params(&[("antivirus_enabled", "maybe")])).is_err());
    }

    async fn caller(store: &MemoryStore) -> User {
        let new_user = NewUser {
            username: "it".into(),
            email: String::new(),
            password_hash: None,
            is_staff: false,
            is_active: true,
        };
        store.create_user(&new_user, None, None).await.unwrap().user
    }

    #[tokio::test]
    async fn create_applies_defaults_and_normalizes_blanks() {
        let store = MemoryStore::new();
        let user = caller(&store).await;
        let asset = AssetService::create(
            &store,
            &user,
            json!({"name": "PC Box 3", "asset_id": "PC-003", "ip_address": "", "purchase_date": ""}),
        )
        .await
        .unwrap();
        assert_eq!(asset.fields.status, "Activo");
        assert_eq!(asset.fields.asset_type, AssetType::Computer);
        assert_eq!(asset.fields.ip_address, None);
        assert_eq!(asset.fields.purchase_date, None);
    }

    #[tokio::test]
    async fn patch_keeps_unsent_fields_and_put_requires_identity() {
        let store = MemoryStore::new();
        let user = caller(&store).await;
        let asset = AssetService::create(
            &store,
            &user,
            json!({"name": "Switch", "asset_id": "NET-7", "asset_type": "network_device", "location": "Rack 2"}),
        )
        .await
        .unwrap();

        let patched = AssetService::update(&store, &user, asset.id, json!({"status": "En reparación"}), Mode::Partial)
            .await
            .unwrap();
        assert_eq!(patched.fields.location.as_deref(), Some("Rack 2"));
        assert_eq!(patched.fields.status, "En reparación");

        let err = AssetService::update(&store, &user, asset.id, json!({"status": "Baja"}), Mode::Full)
            .await
            .unwrap_err();
        match err {
            AppError::Validation(e) => {
                assert!(e.get("name").is_some());
                assert!(e.get("asset_id").is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_choice_and_ip_are_reported_together() {
        let store = MemoryStore::new();
        let user = caller(&store).await;
        let err = AssetService::create(
            &store,
            &user,
            json!({"name": "X", "asset_id": "X-1", "asset_type": "laptop", "ip_address": "10.0.0.300"}),
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(e) => {
                assert_eq!(e.get("asset_type").unwrap()[0], "\"laptop\" is not a valid choice.");
                assert_eq!(e.get("ip_address").unwrap()[0], "Enter a valid IPv4 or IPv6 address.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
