//! Imaging requests: a patient, a requesting doctor and a set of catalog exams.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Writable request columns. `selected_exams` and `doctor` resolution are handled by the service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImagingRequestFields {
    pub patient_name: String,
    pub patient_rut: String,
    #[serde(default)]
    pub patient_phone: Option<String>,
    #[serde(default)]
    pub patient_prevencion: Option<String>,
    #[serde(default = "today")]
    pub request_date: NaiveDate,
    /// Requesting doctor (user id of the doctor record).
    #[serde(default)]
    pub doctor: Option<i64>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl ImagingRequestFields {
    pub fn new(patient_name: impl Into<String>, patient_rut: impl Into<String>) -> Self {
        ImagingRequestFields {
            patient_name: patient_name.into(),
            patient_rut: patient_rut.into(),
            patient_phone: None,
            patient_prevencion: None,
            request_date: today(),
            doctor: None,
            diagnosis: None,
            observations: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImagingRequest {
    pub id: i64,
    #[serde(flatten)]
    pub fields: ImagingRequestFields,
    /// Exam item ids, ascending.
    pub selected_exams: Vec<i64>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Newest request date first, then patient name.
pub fn sort_requests(requests: &mut [ImagingRequest]) {
    requests.sort_by(|a, b| {
        b.fields
            .request_date
            .cmp(&a.fields.request_date)
            .then_with(|| a.fields.patient_name.cmp(&b.fields.patient_name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ImagingRequestView {
    #[serde(flatten)]
    pub request: ImagingRequest,
    pub doctor_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum HistoryType {
    #[serde(rename = "+")]
    Created,
    #[serde(rename = "~")]
    Changed,
    #[serde(rename = "-")]
    Deleted,
}

impl HistoryType {
    pub fn code(&self) -> &'static str {
        match self {
            HistoryType::Created => "+",
            HistoryType::Changed => "~",
            HistoryType::Deleted => "-",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "+" => Some(HistoryType::Created),
            "~" => Some(HistoryType::Changed),
            "-" => Some(HistoryType::Deleted),
            _ => None,
        }
    }
}

/// Audit snapshot written on every change to a request.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ImagingRequestHistory {
    pub history_id: i64,
    pub request_id: i64,
    pub history_type: HistoryType,
    pub history_date: DateTime<Utc>,
    pub history_user_id: Option<i64>,
    /// The request as it was after the change.
    #[schema(value_type = Object)]
    pub snapshot: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(id: i64, name: &str, date: NaiveDate) -> ImagingRequest {
        let mut fields = ImagingRequestFields::new(name, "11.111.111-1");
        fields.request_date = date;
        ImagingRequest {
            id,
            fields,
            selected_exams: vec![],
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn requests_sort_newest_first_then_patient() {
        let d1 = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let mut list = vec![request(1, "Zoe", d1), request(2, "Luis", d2), request(3, "Ana", d2)];
        sort_requests(&mut list);
        let ids: Vec<_> = list.iter().map(|r| r.id).collect();
        assert_eq!(ids, [3, 2, 1]);
    }

    #[test]
    fn history_type_codes() {
        for t in [HistoryType::Created, HistoryType::Changed, HistoryType::Deleted] {
            assert_eq!(HistoryType::from_code(t.code()), Some(t));
            assert_eq!(serde_json::to_value(t).unwrap(), t.code());
        }
        assert_eq!(HistoryType::from_code("x"), None);
    }

    #[test]
    fn request_date_defaults_to_today() {
        let fields: ImagingRequestFields =
            serde_json::from_value(serde_json::json!({"patient_name": "Ana", "patient_rut": "1-9"})).unwrap();
        assert_eq!(fields.request_date, today());
        assert_eq!(fields.doctor, None);
    }
}
