//! Imaging requests: caller scope, doctor resolution, exam selection and audit history.

use super::merge::{request_doctor_on_create, request_doctor_on_update, Reference};
use super::validation::{body_object, from_map, merge_onto, to_value, FieldRule, Format, Mode, RequestValidator};
use crate::error::{AppError, FieldErrors};
use crate::models::{sort_items, Doctor, ImagingRequest, ImagingRequestFields, ImagingRequestHistory, ImagingRequestView, User};
use crate::report::ReportData;
use crate::store::{ExamStore, ImagingStore, RequestFilter, Store, UserStore, MAX_LIMIT};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const REQUEST_RULES: &[FieldRule] = &[
    FieldRule::new("patient_name").required().max(255),
    FieldRule::new("patient_rut").required().max(20),
    FieldRule::new("patient_phone").optional().max(20),
    FieldRule::new("patient_prevencion").optional().max(100),
    FieldRule::new("request_date").format(Format::Date),
    FieldRule::new("doctor").nullable().format(Format::Integer),
    FieldRule::new("diagnosis").optional(),
    FieldRule::new("observations").optional(),
    FieldRule::new("selected_exams").format(Format::IdList),
];

/// Which requests a caller may see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Only requests assigned to this doctor.
    Doctor(i64),
    Nothing,
}

impl Scope {
    pub fn allows(&self, request: &ImagingRequest) -> bool {
        if request.is_deleted {
            return false;
        }
        match self {
            Scope::All => true,
            Scope::Doctor(d) => request.fields.doctor == Some(*d),
            Scope::Nothing => false,
        }
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("imaging request {}", id))
}

fn exam_ids(body: &Map<String, Value>) -> Option<Vec<i64>> {
    body.get("selected_exams")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
}

fn doctor_name(doctor: Option<&Doctor>) -> String {
    doctor.map(Doctor::display_name).unwrap_or("N/A").to_string()
}

fn validated(body: Value, mode: Mode) -> Result<Map<String, Value>, AppError> {
    let mut body = body_object(body)?;
    RequestValidator::normalize(&mut body, REQUEST_RULES);
    let mut errors = FieldErrors::new();
    RequestValidator::collect(&body, REQUEST_RULES, mode, "", &mut errors);
    errors.into_result()?;
    Ok(body)
}

pub struct ImagingService;

impl ImagingService {
    async fn caller_doctor(store: &dyn Store, caller: &User) -> Result<Option<i64>, AppError> {
        Ok(store.get_doctor(caller.id).await?.map(|d| d.user))
    }

    pub async fn scope(store: &dyn Store, caller: &User) -> Result<Scope, AppError> {
        if caller.is_staff {
            return Ok(Scope::All);
        }
        Ok(match Self::caller_doctor(store, caller).await? {
            Some(d) => Scope::Doctor(d),
            None => Scope::Nothing,
        })
    }

    async fn view(store: &dyn Store, request: ImagingRequest) -> Result<ImagingRequestView, AppError> {
        let doctor = match request.fields.doctor {
            Some(d) => store.get_doctor(d).await?,
            None => None,
        };
        Ok(ImagingRequestView {
            doctor_name: doctor_name(doctor.as_ref()),
            request,
        })
    }

    async fn visible(store: &dyn Store, caller: &User, id: i64) -> Result<ImagingRequest, AppError> {
        let scope = Self::scope(store, caller).await?;
        store
            .get_request(id)
            .await?
            .filter(|r| scope.allows(r))
            .ok_or_else(|| not_found(id))
    }

    /// `?doctor=<id>` narrows the caller's scope. Without `limit` every request in scope is returned.
    pub async fn list(
        store: &dyn Store,
        caller: &User,
        params: &HashMap<String, String>,
    ) -> Result<Vec<ImagingRequestView>, AppError> {
        let requested = match params.get("doctor") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::field("doctor", "Select a valid choice. That choice is not one of the available choices."))?,
            ),
            None => None,
        };
        let doctor = match (Self::scope(store, caller).await?, requested) {
            (Scope::Nothing, _) => return Ok(Vec::new()),
            (Scope::Doctor(own), Some(other)) if own != other => return Ok(Vec::new()),
            (Scope::Doctor(own), _) => Some(own),
            (Scope::All, requested) => requested,
        };
        let filter = RequestFilter {
            doctor,
            include_deleted: false,
            limit: params
                .get("limit")
                .and_then(|v| v.parse::<u32>().ok())
                .map(|n| n.min(MAX_LIMIT)),
            offset: params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0),
        };
        let requests = store.list_requests(&filter).await?;
        let names: HashMap<i64, String> = store
            .list_doctors()
            .await?
            .iter()
            .map(|d| (d.user, d.display_name().to_string()))
            .collect();
        Ok(requests
            .into_iter()
            .map(|request| ImagingRequestView {
                doctor_name: request
                    .fields
                    .doctor
                    .and_then(|d| names.get(&d).cloned())
                    .unwrap_or_else(|| "N/A".to_string()),
                request,
            })
            .collect())
    }

    pub async fn retrieve(store: &dyn Store, caller: &User, id: i64) -> Result<ImagingRequestView, AppError> {
        let request = Self::visible(store, caller, id).await?;
        Self::view(store, request).await
    }

    pub async fn create(store: &dyn Store, caller: &User, body: Value) -> Result<ImagingRequestView, AppError> {
        let mut body = validated(body, Mode::Full)?;
        let caller_doctor = Self::caller_doctor(store, caller).await?;
        let doctor = request_doctor_on_create(Reference::read(&body, "doctor"), caller_doctor);
        let exams = exam_ids(&body).unwrap_or_default();
        body.insert("doctor".into(), doctor.into());
        let fields: ImagingRequestFields = from_map(body)?;

        let request = store.create_request(&fields, &exams, Some(caller.id)).await?;
        tracing::info!(id = request.id, doctor = ?request.fields.doctor, by = caller.id, "imaging request created");
        Self::view(store, request).await
    }

    /// PUT requires the patient fields; either way `selected_exams` is replaced only when sent.
    pub async fn update(
        store: &dyn Store,
        caller: &User,
        id: i64,
        body: Value,
        mode: Mode,
    ) -> Result<ImagingRequestView, AppError> {
        let existing = Self::visible(store, caller, id).await?;
        let body = validated(body, mode)?;
        let caller_doctor = Self::caller_doctor(store, caller).await?;
        let doctor = request_doctor_on_update(Reference::read(&body, "doctor"), existing.fields.doctor, caller_doctor);
        let exams = exam_ids(&body);

        let mut merged = merge_onto(to_value(&existing.fields), &body);
        merged.insert("doctor".into(), doctor.into());
        let fields: ImagingRequestFields = from_map(merged)?;

        let request = store
            .update_request(id, &fields, exams.as_deref(), Some(caller.id))
            .await?
            .ok_or_else(|| not_found(id))?;
        tracing::info!(id, doctor = ?request.fields.doctor, by = caller.id, "imaging request updated");
        Self::view(store, request).await
    }

    /// Soft delete. Storage failures are reported as a 400 carrying the error text.
    pub async fn delete(store: &dyn Store, caller: &User, id: i64) -> Result<(), AppError> {
        Self::visible(store, caller, id).await?;
        match store.soft_delete_request(id, Some(caller.id)).await {
            Ok(true) => {
                tracing::info!(id, by = caller.id, "imaging request soft-deleted");
                Ok(())
            }
            Ok(false) => Err(not_found(id)),
            Err(e) => {
                tracing::warn!(id, error = %e, "soft delete failed");
                Err(AppError::BadRequest(e.to_string()))
            }
        }
    }

    /// Audit snapshots, newest first.
    pub async fn history(store: &dyn Store, caller: &User, id: i64) -> Result<Vec<ImagingRequestHistory>, AppError> {
        Self::visible(store, caller, id).await?;
        store.request_history(id).await
    }

    /// Everything the PDF needs, with the selected exams ordered by name.
    pub async fn report_data(store: &dyn Store, caller: &User, id: i64) -> Result<ReportData, AppError> {
        let view = Self::retrieve(store, caller, id).await?;
        let mut exams = store.items_by_ids(&view.request.selected_exams).await?;
        sort_items(&mut exams);
        Ok(ReportData { view, exams })
    }
}
