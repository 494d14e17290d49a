//! Request validation from per-field rules. Every failing field is reported, not only the first.

use crate::error::{AppError, FieldErrors, NON_FIELD_ERRORS};
use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::net::IpAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Email,
    IpAddress,
    /// `YYYY-MM-DD`.
    Date,
    Integer,
    Boolean,
    /// Array of integer primary keys.
    IdList,
}

/// Validation rule for one body key.
#[derive(Clone, Copy, Debug)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub nullable: bool,
    pub allow_blank: bool,
    /// Blank strings are stored as null.
    pub blank_as_null: bool,
    pub max_length: Option<usize>,
    pub pattern: Option<(&'static str, &'static str)>,
    pub allowed: Option<&'static [&'static str]>,
    pub format: Format,
}

impl FieldRule {
    pub const fn new(name: &'static str) -> Self {
        FieldRule {
            name,
            required: false,
            nullable: false,
            allow_blank: false,
            blank_as_null: false,
            max_length: None,
            pattern: None,
            allowed: None,
            format: Format::Text,
        }
    }

    pub const fn required(self) -> Self {
        FieldRule { required: true, ..self }
    }

    /// Nullable and blank-able, the shape of most optional text columns.
    pub const fn optional(self) -> Self {
        FieldRule { nullable: true, allow_blank: true, ..self }
    }

    pub const fn nullable(self) -> Self {
        FieldRule { nullable: true, ..self }
    }

    pub const fn blank(self) -> Self {
        FieldRule { allow_blank: true, ..self }
    }

    pub const fn blank_as_null(self) -> Self {
        FieldRule { nullable: true, allow_blank: true, blank_as_null: true, ..self }
    }

    pub const fn max(self, n: usize) -> Self {
        FieldRule { max_length: Some(n), ..self }
    }

    /// Regex the value must match, with the message shown when it does not.
    pub const fn pattern(self, re: &'static str, message: &'static str) -> Self {
        FieldRule { pattern: Some((re, message)), ..self }
    }

    pub const fn choices(self, allowed: &'static [&'static str]) -> Self {
        FieldRule { allowed: Some(allowed), ..self }
    }

    pub const fn format(self, format: Format) -> Self {
        FieldRule { format, ..self }
    }
}

/// Whether absent required keys are errors (create, PUT) or not (PATCH).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Full,
    Partial,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate `body` against `rules`, collecting every message.
    pub fn validate(body: &Map<String, Value>, rules: &[FieldRule], mode: Mode) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        Self::collect(body, rules, mode, "", &mut errors);
        errors.into_result()
    }

    /// Same as `validate` but appends into `errors`, prefixing keys (`"doctor."`) for nested objects.
    pub fn collect(body: &Map<String, Value>, rules: &[FieldRule], mode: Mode, prefix: &str, errors: &mut FieldErrors) {
        for rule in rules {
            let key = format!("{}{}", prefix, rule.name);
            match body.get(rule.name) {
                None => {
                    if rule.required && mode == Mode::Full {
                        errors.push(key, "This field is required.");
                    }
                }
                Some(Value::Null) => {
                    if !rule.nullable {
                        errors.push(key, "This field may not be null.");
                    }
                }
                Some(v) => {
                    if let Err(message) = validate_field(v, rule) {
                        errors.push(key, message);
                    }
                }
            }
        }
    }

    /// Coerce lenient inputs into canonical JSON: blank-as-null strings, numeric strings
    /// for integer keys, `"true"`/`"false"` for booleans.
    pub fn normalize(body: &mut Map<String, Value>, rules: &[FieldRule]) {
        for rule in rules {
            let Some(v) = body.get_mut(rule.name) else { continue };
            let replacement = match (rule.format, &*v) {
                (_, Value::String(s)) if rule.blank_as_null && s.trim().is_empty() => Some(Value::Null),
                (Format::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
                (Format::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            };
            if let Some(new) = replacement {
                *v = new;
            }
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

fn matches(pattern: &str, s: &str) -> bool {
    Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false)
}

fn validate_field(v: &Value, rule: &FieldRule) -> Result<(), String> {
    match rule.format {
        Format::Integer => {
            return v.as_i64().map(|_| ()).ok_or_else(|| "A valid integer is required.".to_string());
        }
        Format::Boolean => {
            return v.as_bool().map(|_| ()).ok_or_else(|| "Must be a valid boolean.".to_string());
        }
        Format::IdList => {
            let items = v
                .as_array()
                .ok_or_else(|| format!("Expected a list of items but got type \"{}\".", json_type(v)))?;
            for item in items {
                if item.as_i64().is_none() {
                    return Err(format!("Incorrect type. Expected pk value, received {}.", json_type(item)));
                }
            }
            return Ok(());
        }
        _ => {}
    }

    let s = v.as_str().ok_or_else(|| "Not a valid string.".to_string())?;
    if s.trim().is_empty() {
        return if rule.allow_blank {
            Ok(())
        } else {
            Err("This field may not be blank.".into())
        };
    }
    if let Some(max) = rule.max_length {
        if s.chars().count() > max {
            return Err(format!("Ensure this field has no more than {} characters.", max));
        }
    }
    if let Some(allowed) = rule.allowed {
        if !allowed.contains(&s) {
            return Err(format!("\"{}\" is not a valid choice.", s));
        }
    }
    if let Some((pattern, message)) = rule.pattern {
        if !matches(pattern, s) {
            return Err(message.to_string());
        }
    }
    match rule.format {
        Format::Email if !matches(EMAIL_PATTERN, s) => Err("Enter a valid email address.".into()),
        Format::IpAddress if s.parse::<IpAddr>().is_err() => Err("Enter a valid IPv4 or IPv6 address.".into()),
        Format::Date if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() => {
            Err("Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".into())
        }
        _ => Ok(()),
    }
}

/// The request body as a JSON object.
pub fn body_object(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        other => Err(AppError::field(
            NON_FIELD_ERRORS,
            format!("Invalid data. Expected a dictionary, but got {}.", json_type(&other)),
        )),
    }
}

/// Overlay `patch` keys onto the serialized `base` record (top level only).
pub fn merge_onto(base: Value, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = match base {
        Value::Object(m) => m,
        _ => Map::new(),
    };
    for (k, v) in patch {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Deserialize an already validated object into its typed form.
pub fn from_map<T: DeserializeOwned>(map: Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| AppError::field(NON_FIELD_ERRORS, format!("Invalid data: {}", e)))
}

/// Serialize a typed record back into a JSON object for merging.
pub fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
