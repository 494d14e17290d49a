use super::{map_db_error, PgStore};
use crate::models::{Asset, AssetFields, AssetType};
use crate::sql::{bind_all, select_assets, ASSET_COLUMNS};
use crate::store::{AssetQuery, AssetStore, StoreResult};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::Row;

fn asset_from_row(row: &PgRow) -> Result<Asset, sqlx::Error> {
    let raw_type: String = row.try_get("asset_type")?;
    let asset_type = raw_type
        .parse::<AssetType>()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "asset_type".into(),
            source: e.into(),
        })?;
    Ok(Asset {
        id: row.try_get("id")?,
        fields: AssetFields {
            name: row.try_get("name")?,
            asset_id: row.try_get("asset_id")?,
            asset_type,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            connectivity: row.try_get("connectivity")?,
            antivirus_enabled: row.try_get("antivirus_enabled")?,
            purchase_date: row.try_get("purchase_date")?,
            warranty_expiry_date: row.try_get("warranty_expiry_date")?,
            contract_number: row.try_get("contract_number")?,
            location: row.try_get("location")?,
            ip_address: row.try_get("ip_address")?,
            mac_address: row.try_get("mac_address")?,
            assigned_to: row.try_get("assigned_to")?,
        },
    })
}

/// Binds the 14 writable columns as $1..$14 in declaration order.
fn bind_fields<'q>(query: Query<'q, Postgres, PgArguments>, f: &'q AssetFields) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&f.name)
        .bind(&f.asset_id)
        .bind(f.asset_type.as_str())
        .bind(&f.description)
        .bind(&f.status)
        .bind(f.connectivity)
        .bind(f.antivirus_enabled)
        .bind(f.purchase_date)
        .bind(f.warranty_expiry_date)
        .bind(&f.contract_number)
        .bind(&f.location)
        .bind(&f.ip_address)
        .bind(&f.mac_address)
        .bind(&f.assigned_to)
}

#[async_trait]
impl AssetStore for PgStore {
    async fn list_assets(&self, query: &AssetQuery) -> StoreResult<Vec<Asset>> {
        let q = select_assets(query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(asset_from_row).collect::<Result<_, _>>()?)
    }

    async fn get_asset(&self, id: i64) -> StoreResult<Option<Asset>> {
        let sql = format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(asset_from_row).transpose()?)
    }

    async fn create_asset(&self, fields: &AssetFields) -> StoreResult<Asset> {
        let sql = format!(
            "INSERT INTO assets (name, asset_id, asset_type, description, status, connectivity, \
             antivirus_enabled, purchase_date, warranty_expiry_date, contract_number, location, \
             ip_address, mac_address, assigned_to) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {}",
            ASSET_COLUMNS
        );
        let row = bind_fields(sqlx::query(&sql), fields)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(asset_from_row(&row)?)
    }

    async fn update_asset(&self, id: i64, fields: &AssetFields) -> StoreResult<Option<Asset>> {
        let sql = format!(
            "UPDATE assets SET name = $1, asset_id = $2, asset_type = $3, description = $4, \
             status = $5, connectivity = $6, antivirus_enabled = $7, purchase_date = $8, \
             warranty_expiry_date = $9, contract_number = $10, location = $11, ip_address = $12, \
             mac_address = $13, assigned_to = $14 WHERE id = $15 RETURNING {}",
            ASSET_COLUMNS
        );
        let row = bind_fields(sqlx::query(&sql), fields)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(row.as_ref().map(asset_from_row).transpose()?)
    }

    async fn delete_asset(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
