use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{
    dispatch, optional_attendance_status, optional_date, optional_str, required_date,
    required_str, to_json, today, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;
use crate::permissions::{authorize, Action, Actor, Resource};
use crate::store::attendance::{self, MarkEntry, RecordFilter, RecordPatch};
use crate::store::{classes, enrollments};

fn list(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::AttendanceRecord { class_owner: None })?;
    let mut filter = RecordFilter {
        class_id: optional_str(params, "classId")?,
        student_id: optional_str(params, "studentId")?,
        enrollment_id: optional_str(params, "enrollmentId")?,
        status: optional_attendance_status(params, "status")?,
        from: optional_date(params, "from")?,
        to: optional_date(params, "to")?,
        ..Default::default()
    };
    if let Some(day) = optional_date(params, "date")? {
        filter.from = Some(day);
        filter.to = Some(day);
    }
    let rows = attendance::list(conn, &filter)?;
    Ok(json!({ "records": to_json(&rows)? }))
}

fn get(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::AttendanceRecord { class_owner: None })?;
    let id = required_str(params, "recordId")?;
    Ok(json!({ "record": to_json(&attendance::get(conn, &id)?)? }))
}

fn create(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let enrollment_id = required_str(params, "enrollmentId")?;
    let enrollment = enrollments::get(conn, &enrollment_id)?;
    let owner = classes::owner_of(conn, &enrollment.class_id)?;
    authorize(
        actor,
        Action::Create,
        Resource::AttendanceRecord { class_owner: Some(&owner) },
    )?;
    let record = attendance::create(
        conn,
        &enrollment.id,
        required_date(params, "date")?,
        optional_attendance_status(params, "status")?.unwrap_or(AttendanceStatus::Absent),
        optional_str(params, "note")?.as_deref().unwrap_or(""),
    )?;
    Ok(json!({ "record": to_json(&record)? }))
}

fn update(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "recordId")?;
    let owner = attendance::class_owner_of(conn, &id)?;
    authorize(
        actor,
        Action::Update,
        Resource::AttendanceRecord { class_owner: Some(&owner) },
    )?;
    let patch = RecordPatch {
        date: optional_date(params, "date")?,
        status: optional_attendance_status(params, "status")?,
        note: optional_str(params, "note")?,
    };
    let record = attendance::update(conn, &id, &patch)?;
    Ok(json!({ "record": to_json(&record)? }))
}

fn delete(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "recordId")?;
    let owner = attendance::class_owner_of(conn, &id)?;
    authorize(
        actor,
        Action::Delete,
        Resource::AttendanceRecord { class_owner: Some(&owner) },
    )?;
    attendance::delete(conn, &id)?;
    Ok(json!({ "deleted": true }))
}

fn parse_entries(params: &Value) -> ServiceResult<Vec<MarkEntry>> {
    let Some(items) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(ServiceError::invalid("entries", "entries must be an array"));
    };
    if items.is_empty() {
        return Err(ServiceError::invalid("entries", "entries must not be empty"));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let field = |name: &str| format!("entries[{}].{}", i, name);
            if !item.is_object() {
                return Err(ServiceError::invalid(&format!("entries[{}]", i), "entry must be an object"));
            }
            let student_id = required_str(item, "studentId")
                .map_err(|_| ServiceError::invalid(&field("studentId"), "missing studentId"))?;
            let status = optional_attendance_status(item, "status")
                .map_err(|_| {
                    ServiceError::invalid(
                        &field("status"),
                        "status must be one of present, absent, justified",
                    )
                })?
                .unwrap_or(AttendanceStatus::Present);
            let note = optional_str(item, "note")
                .map_err(|_| ServiceError::invalid(&field("note"), "note must be a string"))?
                .unwrap_or_default();
            Ok(MarkEntry {
                student_id,
                status,
                note,
            })
        })
        .collect()
}

/// Bulk attendance for one class and day. Permission failures reject the
/// whole call; a bad student id only fails its own entry.
fn mark(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let class_id = required_str(params, "classId")?;
    let owner = classes::owner_of(conn, &class_id)?;
    authorize(
        actor,
        Action::Create,
        Resource::AttendanceRecord { class_owner: Some(&owner) },
    )?;
    let date = match optional_date(params, "date")? {
        Some(d) => d,
        None => today(params)?,
    };
    let entries = parse_entries(params)?;
    let results = attendance::mark_class(conn, &class_id, date, &entries)?;
    let succeeded = results.iter().filter(|r| r.ok).count();
    tracing::info!(
        class_id = %class_id,
        date = %date,
        succeeded,
        failed = results.len() - succeeded,
        "attendance marked"
    );
    Ok(json!({
        "classId": class_id,
        "date": date,
        "succeeded": succeeded,
        "failed": results.len() - succeeded,
        "results": to_json(&results)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "attendance.list" => list,
        "attendance.get" => get,
        "attendance.create" => create,
        "attendance.update" => update,
        "attendance.delete" => delete,
        "attendance.mark" => mark,
        _ => return None,
    };
    Some(dispatch(state, req, op))
}
