use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::ServiceResult;
use crate::ipc::helpers::{dispatch, optional_str, required_str, to_json, Op};
use crate::ipc::types::{AppState, Request};
use crate::permissions::{authorize, Action, Actor, Resource};
use crate::store::enrollments;

fn list(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::Enrollment)?;
    let class_id = optional_str(params, "classId")?;
    let student_id = optional_str(params, "studentId")?;
    let rows = enrollments::list(conn, class_id.as_deref(), student_id.as_deref())?;
    Ok(json!({ "enrollments": to_json(&rows)? }))
}

fn get(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::Enrollment)?;
    let id = required_str(params, "enrollmentId")?;
    Ok(json!({ "enrollment": to_json(&enrollments::get_row(conn, &id)?)? }))
}

fn create(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Create, Resource::Enrollment)?;
    let class_id = required_str(params, "classId")?;
    let student_id = required_str(params, "studentId")?;
    let e = enrollments::create(conn, &class_id, &student_id)?;
    Ok(json!({ "enrollment": to_json(&enrollments::get_row(conn, &e.id)?)? }))
}

fn delete(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Delete, Resource::Enrollment)?;
    let id = required_str(params, "enrollmentId")?;
    enrollments::delete(conn, &id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "enrollments.list" => list,
        "enrollments.get" => get,
        "enrollments.create" => create,
        "enrollments.delete" => delete,
        _ => return None,
    };
    Some(dispatch(state, req, op))
}
