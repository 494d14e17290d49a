//! Keep / replace / null-out decisions for related records on write.
//!
//! A payload key can be absent, explicitly `null`, or carry a value; the three cases mean
//! different things depending on the resource and on whether the write is a PUT or a PATCH.

use super::validation::{from_map, merge_onto, to_value, FieldRule, Mode, RequestValidator};
use crate::error::{AppError, FieldErrors};
use crate::store::SubRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Tri-state view of a nested object key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Nested<'a> {
    Absent,
    Null,
    Present(&'a Map<String, Value>),
}

impl<'a> Nested<'a> {
    pub fn read(body: &'a Map<String, Value>, key: &str) -> Result<Self, AppError> {
        match body.get(key) {
            None => Ok(Nested::Absent),
            Some(Value::Null) => Ok(Nested::Null),
            Some(Value::Object(m)) => Ok(Nested::Present(m)),
            Some(_) => Err(AppError::field(key, "Invalid data. Expected a dictionary.")),
        }
    }
}

/// Tri-state view of a foreign-key id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reference {
    Absent,
    Null,
    Id(i64),
}

impl Reference {
    /// Expects the key to have been validated as a nullable integer already.
    pub fn read(body: &Map<String, Value>, key: &str) -> Self {
        match body.get(key) {
            None => Reference::Absent,
            Some(v) => v.as_i64().map(Reference::Id).unwrap_or(Reference::Null),
        }
    }
}

/// Overlay `patch` onto `existing` (or defaults), validate the supplied keys and parse.
fn overlay<T>(key: &str, existing: Option<&T>, patch: &Map<String, Value>, rules: &[FieldRule]) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut patch = patch.clone();
    RequestValidator::normalize(&mut patch, rules);
    let mut errors = FieldErrors::new();
    RequestValidator::collect(&patch, rules, Mode::Partial, &format!("{}.", key), &mut errors);
    errors.into_result()?;
    let base = match existing {
        Some(v) => to_value(v),
        None => to_value(&T::default()),
    };
    from_map(merge_onto(base, &patch))
}

/// Sub-record to create alongside a new user: only a non-empty object creates one.
pub fn on_create<T>(key: &str, nested: Nested<'_>, rules: &[FieldRule]) -> Result<Option<T>, AppError>
where
    T: Serialize + DeserializeOwned + Default,
{
    match nested {
        Nested::Present(m) if !m.is_empty() => overlay(key, None, m, rules).map(Some),
        _ => Ok(None),
    }
}

/// Profile on update: absent or null keeps it, an object upserts.
pub fn profile_on_update<T>(
    key: &str,
    nested: Nested<'_>,
    existing: Option<&T>,
    rules: &[FieldRule],
) -> Result<SubRecord<T>, AppError>
where
    T: Serialize + DeserializeOwned + Default,
{
    match nested {
        Nested::Absent | Nested::Null => Ok(SubRecord::Keep),
        Nested::Present(m) => overlay(key, existing, m, rules).map(SubRecord::Upsert),
    }
}

/// Doctor on update: null removes it, an object upserts, and absence removes on PUT
/// but keeps on PATCH.
pub fn doctor_on_update<T>(
    key: &str,
    nested: Nested<'_>,
    mode: Mode,
    existing: Option<&T>,
    rules: &[FieldRule],
) -> Result<SubRecord<T>, AppError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let remove = || {
        if existing.is_some() {
            SubRecord::Remove
        } else {
            SubRecord::Keep
        }
    };
    match (nested, mode) {
        (Nested::Present(m), _) => overlay(key, existing, m, rules).map(SubRecord::Upsert),
        (Nested::Null, _) | (Nested::Absent, Mode::Full) => Ok(remove()),
        // PATCH without the key leaves the doctor record alone; only PUT or an explicit
        // null removes it.
        (Nested::Absent, Mode::Partial) => Ok(SubRecord::Keep),
    }
}

/// Requesting doctor for a new imaging request. Falls back to the caller's own doctor record.
pub fn request_doctor_on_create(payload: Reference, caller_doctor: Option<i64>) -> Option<i64> {
    match payload {
        Reference::Id(id) => Some(id),
        Reference::Absent | Reference::Null => caller_doctor,
    }
}

/// Requesting doctor after an update.
///
/// An explicit id always wins. When none is given, a request without a doctor is claimed by
/// a calling doctor; otherwise an absent key keeps the current doctor and `null` clears it.
pub fn request_doctor_on_update(payload: Reference, current: Option<i64>, caller_doctor: Option<i64>) -> Option<i64> {
    match payload {
        Reference::Id(id) => Some(id),
        Reference::Absent | Reference::Null if current.is_none() && caller_doctor.is_some() => caller_doctor,
        Reference::Absent => current,
        Reference::Null => None,
    }
}
