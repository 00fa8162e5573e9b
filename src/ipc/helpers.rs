use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use super::error::ok;
use super::types::{AppState, Request};
use crate::error::{ServiceError, ServiceResult};
use crate::model::{AttendanceStatus, ClassStatus, Gender};
use crate::permissions::Actor;
use crate::store::users;

/// A request handler once the workspace and actor are known.
pub type Op = fn(&Connection, &Actor, &Value) -> ServiceResult<Value>;

/// Resolves the connection and actor, runs `op` and renders the response.
pub fn dispatch(state: &AppState, req: &Request, op: Op) -> Value {
    tracing::debug!(request_id = %req.id, method = %req.method, "handling request");
    let result = state
        .db
        .as_ref()
        .ok_or(ServiceError::NoWorkspace)
        .and_then(|conn| {
            let actor = users::resolve_actor(conn, req.actor_id.as_deref())?;
            op(conn, &actor, &req.params)
        });
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> ServiceResult<Value> {
    serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

fn present<'a>(params: &'a Value, key: &str) -> Option<&'a Value> {
    params.get(key).filter(|v| !v.is_null())
}

pub fn optional_str(params: &Value, key: &str) -> ServiceResult<Option<String>> {
    match present(params, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ServiceError::invalid(key, format!("{} must be a string", key))),
    }
}

pub fn required_str(params: &Value, key: &str) -> ServiceResult<String> {
    optional_str(params, key)?
        .ok_or_else(|| ServiceError::invalid(key, format!("missing {}", key)))
}

/// Absent key -> `None`, explicit null -> `Some(None)`.
pub fn nullable_str(params: &Value, key: &str) -> ServiceResult<Option<Option<String>>> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(ServiceError::invalid(
            key,
            format!("{} must be a string or null", key),
        )),
    }
}

pub fn optional_bool(params: &Value, key: &str) -> ServiceResult<Option<bool>> {
    match present(params, key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ServiceError::invalid(key, format!("{} must be a boolean", key))),
    }
}

/// Calendar dates with a four-digit year; anything else is rejected.
pub fn parse_date(key: &str, raw: &str) -> ServiceResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .filter(|d| (1..=9999).contains(&d.year()))
        .ok_or_else(|| ServiceError::invalid(key, format!("{} must be a YYYY-MM-DD date", key)))
}

pub fn optional_date(params: &Value, key: &str) -> ServiceResult<Option<NaiveDate>> {
    optional_str(params, key)?
        .map(|raw| parse_date(key, &raw))
        .transpose()
}

pub fn required_date(params: &Value, key: &str) -> ServiceResult<NaiveDate> {
    parse_date(key, &required_str(params, key)?)
}

/// `asOf` when given, otherwise the local calendar date.
pub fn today(params: &Value) -> ServiceResult<NaiveDate> {
    Ok(optional_date(params, "asOf")?.unwrap_or_else(|| chrono::Local::now().date_naive()))
}

fn optional_enum<T>(
    params: &Value,
    key: &str,
    parse: fn(&str) -> Option<T>,
    allowed: &str,
) -> ServiceResult<Option<T>> {
    optional_str(params, key)?
        .map(|raw| {
            parse(&raw).ok_or_else(|| {
                ServiceError::invalid(key, format!("{} must be one of {}", key, allowed))
            })
        })
        .transpose()
}

pub fn optional_attendance_status(params: &Value, key: &str) -> ServiceResult<Option<AttendanceStatus>> {
    optional_enum(params, key, AttendanceStatus::parse, "present, absent, justified")
}

pub fn optional_class_status(params: &Value, key: &str) -> ServiceResult<Option<ClassStatus>> {
    optional_enum(params, key, ClassStatus::parse, "active, completed, cancelled")
}

pub fn optional_gender(params: &Value, key: &str) -> ServiceResult<Option<Gender>> {
    optional_enum(params, key, Gender::parse, "M, F, O, N")
}

/// Trimmed, non-empty search term.
pub fn search_term(params: &Value) -> ServiceResult<Option<String>> {
    Ok(optional_str(params, "search")?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
