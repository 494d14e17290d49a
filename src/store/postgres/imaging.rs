use super::{map_db_error, PgStore};
use crate::models::{HistoryType, ImagingRequest, ImagingRequestFields, ImagingRequestHistory};
use crate::store::{conflict, request_snapshot, ImagingStore, RequestFilter, StoreResult};
use crate::sql::{bind_all, select_requests, REQUEST_COLUMNS};
use async_trait::async_trait;
use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::{PgConnection, Row};

fn request_from_row(row: &PgRow) -> Result<ImagingRequest, sqlx::Error> {
    Ok(ImagingRequest {
        id: row.try_get("id")?,
        fields: ImagingRequestFields {
            patient_name: row.try_get("patient_name")?,
            patient_rut: row.try_get("patient_rut")?,
            patient_phone: row.try_get("patient_phone")?,
            patient_prevencion: row.try_get("patient_prevencion")?,
            request_date: row.try_get("request_date")?,
            doctor: row.try_get("doctor_id")?,
            diagnosis: row.try_get("diagnosis")?,
            observations: row.try_get("observations")?,
        },
        selected_exams: row.try_get("selected_exams")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<ImagingRequestHistory, sqlx::Error> {
    let code: String = row.try_get("history_type")?;
    let history_type = HistoryType::from_code(&code).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "history_type".into(),
        source: format!("unknown history type {:?}", code).into(),
    })?;
    Ok(ImagingRequestHistory {
        history_id: row.try_get("history_id")?,
        request_id: row.try_get("request_id")?,
        history_type,
        history_date: row.try_get("history_date")?,
        history_user_id: row.try_get("history_user_id")?,
        snapshot: row.try_get("snapshot")?,
    })
}

async fn fetch_request<'e>(executor: impl PgExecutor<'e>, id: i64) -> StoreResult<Option<ImagingRequest>> {
    let sql = format!("SELECT {} FROM imaging_requests r WHERE r.id = $1", REQUEST_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    Ok(row.as_ref().map(request_from_row).transpose()?)
}

/// The doctor and every exam must exist; reports the first missing id as a field error.
async fn check_refs(conn: &mut PgConnection, doctor: Option<i64>, exams: Option<&[i64]>) -> StoreResult<()> {
    if let Some(doctor) = doctor {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM doctors WHERE user_id = $1)")
            .bind(doctor)
            .fetch_one(&mut *conn)
            .await?;
        if !exists.0 {
            return Err(conflict::missing("doctor", doctor));
        }
    }
    if let Some(exams) = exams.filter(|e| !e.is_empty()) {
        let found: Vec<(i64,)> = sqlx::query_as("SELECT id FROM exam_items WHERE id = ANY($1)")
            .bind(exams)
            .fetch_all(&mut *conn)
            .await?;
        if let Some(missing) = exams.iter().find(|id| !found.iter().any(|(f,)| f == *id)) {
            return Err(conflict::missing("selected_exams", *missing));
        }
    }
    Ok(())
}

async fn link_exams(conn: &mut PgConnection, request_id: i64, exams: &[i64]) -> StoreResult<()> {
    sqlx::query("DELETE FROM imaging_request_exams WHERE request_id = $1")
        .bind(request_id)
        .execute(&mut *conn)
        .await?;
    if !exams.is_empty() {
        sqlx::query(
            "INSERT INTO imaging_request_exams (request_id, exam_item_id) \
             SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
        )
        .bind(request_id)
        .bind(exams)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    }
    Ok(())
}

async fn write_history(
    conn: &mut PgConnection,
    request: &ImagingRequest,
    kind: HistoryType,
    actor: Option<i64>,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO imaging_request_history (request_id, history_type, history_user_id, snapshot) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(request.id)
    .bind(kind.code())
    .bind(actor)
    .bind(request_snapshot(request))
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl ImagingStore for PgStore {
    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<ImagingRequest>> {
        let q = select_requests(filter);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(request_from_row).collect::<Result<_, _>>()?)
    }

    async fn get_request(&self, id: i64) -> StoreResult<Option<ImagingRequest>> {
        fetch_request(&self.pool, id).await
    }

    async fn create_request(
        &self,
        fields: &ImagingRequestFields,
        exams: &[i64],
        actor: Option<i64>,
    ) -> StoreResult<ImagingRequest> {
        let mut tx = self.pool.begin().await?;
        check_refs(&mut tx, fields.doctor, Some(exams)).await?;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO imaging_requests (patient_name, patient_rut, patient_phone, patient_prevencion, \
             request_date, doctor_id, diagnosis, observations) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(&fields.patient_name)
        .bind(&fields.patient_rut)
        .bind(&fields.patient_phone)
        .bind(&fields.patient_prevencion)
        .bind(fields.request_date)
        .bind(fields.doctor)
        .bind(&fields.diagnosis)
        .bind(&fields.observations)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;
        link_exams(&mut tx, id, exams).await?;
        let request = fetch_request(&mut *tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        write_history(&mut tx, &request, HistoryType::Created, actor).await?;
        tx.commit().await?;
        tracing::info!(request_id = id, "imaging request created");
        Ok(request)
    }

    async fn update_request(
        &self,
        id: i64,
        fields: &ImagingRequestFields,
        exams: Option<&[i64]>,
        actor: Option<i64>,
    ) -> StoreResult<Option<ImagingRequest>> {
        let mut tx = self.pool.begin().await?;
        check_refs(&mut tx, fields.doctor, exams).await?;
        let updated: Option<(i64,)> = sqlx::query_as(
            "UPDATE imaging_requests SET patient_name = $1, patient_rut = $2, patient_phone = $3, \
             patient_prevencion = $4, request_date = $5, doctor_id = $6, diagnosis = $7, \
             observations = $8, updated_at = NOW() WHERE id = $9 RETURNING id",
        )
        .bind(&fields.patient_name)
        .bind(&fields.patient_rut)
        .bind(&fields.patient_phone)
        .bind(&fields.patient_prevencion)
        .bind(fields.request_date)
        .bind(fields.doctor)
        .bind(&fields.diagnosis)
        .bind(&fields.observations)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;
        if updated.is_none() {
            return Ok(None);
        }
        if let Some(exams) = exams {
            link_exams(&mut tx, id, exams).await?;
        }
        let request = fetch_request(&mut *tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        write_history(&mut tx, &request, HistoryType::Changed, actor).await?;
        tx.commit().await?;
        Ok(Some(request))
    }

    async fn soft_delete_request(&self, id: i64, actor: Option<i64>) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let deleted: Option<(i64,)> = sqlx::query_as(
            "UPDATE imaging_requests SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND NOT is_deleted RETURNING id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if deleted.is_none() {
            return Ok(false);
        }
        let request = fetch_request(&mut *tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        write_history(&mut tx, &request, HistoryType::Deleted, actor).await?;
        tx.commit().await?;
        tracing::info!(request_id = id, "imaging request soft-deleted");
        Ok(true)
    }

    async fn request_history(&self, id: i64) -> StoreResult<Vec<ImagingRequestHistory>> {
        let rows = sqlx::query(
            "SELECT history_id, request_id, history_type, history_date, history_user_id, snapshot \
             FROM imaging_request_history WHERE request_id = $1 ORDER BY history_id DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(history_from_row).collect::<Result<_, _>>()?)
    }
}
