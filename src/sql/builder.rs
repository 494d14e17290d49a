//! Builds the filtered list queries. Column names are fixed here; values are always parameters.

use super::params::SqlParam;
use crate::store::{AssetQuery, RequestFilter};

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: impl Into<SqlParam>) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v.into());
        n
    }
}

pub const ASSET_COLUMNS: &str = "id, name, asset_id, asset_type, description, status, connectivity, \
     antivirus_enabled, purchase_date, warranty_expiry_date, contract_number, location, \
     ip_address, mac_address, assigned_to";

/// Columns a search term is matched against.
const ASSET_SEARCH_COLUMNS: &[&str] = &[
    "name",
    "asset_id",
    "asset_type",
    "location",
    "assigned_to",
    "status",
    "description",
];

pub const REQUEST_COLUMNS: &str = "r.id, r.patient_name, r.patient_rut, r.patient_phone, \
     r.patient_prevencion, r.request_date, r.doctor_id, r.diagnosis, r.observations, \
     r.is_deleted, r.created_at, r.updated_at, \
     COALESCE((SELECT array_agg(e.exam_item_id ORDER BY e.exam_item_id) \
     FROM imaging_request_exams e WHERE e.request_id = r.id), '{}') AS selected_exams";

/// Escape LIKE wildcards so a term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn where_clause(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT assets matching every search term and exact filter, ordered by name.
pub fn select_assets(query: &AssetQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();

    for term in &query.search_terms {
        let n = q.push_param(like_pattern(term));
        let any: Vec<String> = ASSET_SEARCH_COLUMNS
            .iter()
            .map(|c| format!("{} ILIKE ${}", c, n))
            .collect();
        where_parts.push(format!("({})", any.join(" OR ")));
    }
    if let Some(t) = query.asset_type {
        let n = q.push_param(t.as_str());
        where_parts.push(format!("asset_type = ${}", n));
    }
    if let Some(status) = &query.status {
        let n = q.push_param(status.as_str());
        where_parts.push(format!("status = ${}", n));
    }
    if let Some(c) = query.connectivity {
        let n = q.push_param(c);
        where_parts.push(format!("connectivity = ${}", n));
    }
    if let Some(a) = query.antivirus_enabled {
        let n = q.push_param(a);
        where_parts.push(format!("antivirus_enabled = ${}", n));
    }

    q.sql = format!(
        "SELECT {} FROM assets{} ORDER BY name, id LIMIT {} OFFSET {}",
        ASSET_COLUMNS,
        where_clause(&where_parts),
        query.limit,
        query.offset
    );
    q
}

/// SELECT imaging requests with their exam ids, newest request date first.
pub fn select_requests(filter: &RequestFilter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    if !filter.include_deleted {
        where_parts.push("NOT r.is_deleted".to_string());
    }
    if let Some(doctor) = filter.doctor {
        let n = q.push_param(doctor);
        where_parts.push(format!("r.doctor_id = ${}", n));
    }
    q.sql = format!(
        "SELECT {} FROM imaging_requests r{} ORDER BY r.request_date DESC, r.patient_name, r.id",
        REQUEST_COLUMNS,
        where_clause(&where_parts),
    );
    if let Some(limit) = filter.limit {
        q.sql.push_str(&format!(" LIMIT {}", limit));
    }
    if filter.offset > 0 {
        q.sql.push_str(&format!(" OFFSET {}", filter.offset));
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetType;

    #[test]
    fn each_search_term_gets_one_param() {
        let query = AssetQuery {
            search_terms: vec!["hp".into(), "50%".into()],
            asset_type: Some(AssetType::Printer),
            connectivity: Some(false),
            ..Default::default()
        };
        let q = select_assets(&query);
        assert_eq!(
            q.params,
            vec![
                SqlParam::Text("%hp%".into()),
                SqlParam::Text("%50\\%%".into()),
                SqlParam::Text("printer".into()),
                SqlParam::Bool(false),
            ]
        );
        assert!(q.sql.contains("(name ILIKE $1 OR asset_id ILIKE $1"));
        assert!(q.sql.contains("asset_type = $3 AND connectivity = $4"));
        assert!(q.sql.ends_with("ORDER BY name, id LIMIT 100 OFFSET 0"));
    }

    #[test]
    fn unfiltered_asset_list_has_no_where() {
        let q = select_assets(&AssetQuery::default());
        assert!(!q.sql.contains("WHERE"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn request_list_hides_deleted_by_default() {
        let q = select_requests(&RequestFilter { doctor: Some(4), ..Default::default() });
        assert!(q.sql.contains("WHERE NOT r.is_deleted AND r.doctor_id = $1"));
        assert_eq!(q.params, vec![SqlParam::I64(4)]);

        let q = select_requests(&RequestFilter { include_deleted: true, ..Default::default() });
        assert!(!q.sql.contains("WHERE NOT r.is_deleted"));
        assert!(q.sql.ends_with("ORDER BY r.request_date DESC, r.patient_name, r.id"));
    }

    #[test]
    fn request_list_pages_only_when_asked() {
        let q = select_requests(&RequestFilter { limit: Some(20), offset: 40, ..Default::default() });
        assert!(q.sql.ends_with("r.id LIMIT 20 OFFSET 40"));
    }
}
