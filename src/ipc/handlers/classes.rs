use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{
    dispatch, nullable_str, optional_class_status, optional_date, optional_str, required_date,
    required_str, search_term, to_json, today, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::model::ClassStatus;
use crate::permissions::{authorize, Action, Actor, Resource};
use crate::reports;
use crate::store::attendance::{self, RecordFilter};
use crate::store::classes::{self, ClassFilter, ClassPatch, NewClass};
use crate::store::{enrollments, professors};
use crate::validate;

fn list(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::Class { owner: None })?;
    let filter = ClassFilter {
        status: optional_class_status(params, "status")?,
        professor_id: optional_str(params, "professorId")?,
        search: search_term(params)?,
        running_only: false,
    };
    let rows = classes::list(conn, &filter, today(params)?)?;
    Ok(json!({ "classes": to_json(&rows)? }))
}

/// Classes running today: active status and inside their date range.
fn active(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::Class { owner: None })?;
    let filter = ClassFilter {
        running_only: true,
        ..Default::default()
    };
    let rows = classes::list(conn, &filter, today(params)?)?;
    Ok(json!({ "classes": to_json(&rows)? }))
}

fn get(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "classId")?;
    let row = classes::get_row(conn, &id, today(params)?)?;
    authorize(
        actor,
        Action::Read,
        Resource::Class {
            owner: Some(&row.class.professor_id),
        },
    )?;
    Ok(json!({ "class": to_json(&row)? }))
}

fn create(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Create, Resource::Class { owner: None })?;
    let new = NewClass {
        name: validate::text("name", &required_str(params, "name")?, validate::NAME_MAX)?,
        description: optional_str(params, "description")?
            .map(|d| d.trim().to_string())
            .unwrap_or_default(),
        professor_id: required_str(params, "professorId")?,
        start_date: required_date(params, "startDate")?,
        end_date: required_date(params, "endDate")?,
        status: optional_class_status(params, "status")?.unwrap_or(ClassStatus::Active),
    };
    let class = classes::create(conn, &new)?;
    tracing::info!(class_id = %class.id, professor_id = %class.professor_id, "class created");
    Ok(json!({ "class": to_json(&class)? }))
}

fn update(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "classId")?;
    let owner = classes::owner_of(conn, &id)?;
    authorize(actor, Action::Update, Resource::Class { owner: Some(&owner) })?;
    let professor_id = optional_str(params, "professorId")?;
    if professor_id.as_deref().is_some_and(|p| p != owner) {
        // Reassigning a class to another professor is an administrative act.
        authorize(actor, Action::Create, Resource::Class { owner: None })?;
    }
    let patch = ClassPatch {
        name: optional_str(params, "name")?
            .map(|v| validate::text("name", &v, validate::NAME_MAX))
            .transpose()?,
        description: optional_str(params, "description")?.map(|d| d.trim().to_string()),
        professor_id,
        start_date: optional_date(params, "startDate")?,
        end_date: optional_date(params, "endDate")?,
        status: optional_class_status(params, "status")?,
    };
    let class = classes::update(conn, &id, &patch)?;
    Ok(json!({ "class": to_json(&class)? }))
}

fn delete(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "classId")?;
    let owner = classes::owner_of(conn, &id)?;
    authorize(actor, Action::Delete, Resource::Class { owner: Some(&owner) })?;
    classes::delete(conn, &id)?;
    Ok(json!({ "deleted": true }))
}

fn students(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::ClassRoster)?;
    let id = required_str(params, "classId")?;
    classes::get(conn, &id)?;
    let roster = enrollments::list(conn, Some(&id), None)?;
    Ok(json!({ "enrollments": to_json(&roster)? }))
}

fn enroll(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Create, Resource::Enrollment)?;
    let class_id = required_str(params, "classId")?;
    let student_id = required_str(params, "studentId")?;
    let e = enrollments::create(conn, &class_id, &student_id)?;
    Ok(json!({ "enrollment": to_json(&enrollments::get_row(conn, &e.id)?)? }))
}

fn representative_get(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::ClassRoster)?;
    let id = required_str(params, "classId")?;
    let student = classes::representative(conn, &id)?;
    Ok(json!({ "representative": to_json(&student)? }))
}

fn representative_set(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "classId")?;
    let owner = classes::owner_of(conn, &id)?;
    authorize(actor, Action::Update, Resource::Class { owner: Some(&owner) })?;
    let Some(student_id) = nullable_str(params, "studentId")? else {
        return Err(ServiceError::invalid(
            "studentId",
            "missing studentId (use null to clear)",
        ));
    };
    let student = classes::set_representative(conn, &id, student_id.as_deref())?;
    Ok(json!({ "representative": to_json(&student)? }))
}

fn dashboard(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "classId")?;
    let row = classes::get_row(conn, &id, today(params)?)?;
    authorize(
        actor,
        Action::Read,
        Resource::Class {
            owner: Some(&row.class.professor_id),
        },
    )?;
    let professor = professors::get(conn, &row.class.professor_id)?;
    let roster = enrollments::list(conn, Some(&id), None)?;
    let facts = attendance::load_facts(conn, &RecordFilter::class(&id))?;
    let stats = reports::class_statistics(&row.class.id, &row.class.name, roster.len(), &facts);
    Ok(json!({
        "class": to_json(&row)?,
        "professor": to_json(&professor)?,
        "enrollments": to_json(&roster)?,
        "statistics": to_json(&stats)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "classes.list" => list,
        "classes.active" => active,
        "classes.get" => get,
        "classes.create" => create,
        "classes.update" => update,
        "classes.delete" => delete,
        "classes.students" => students,
        "classes.enroll" => enroll,
        "classes.representative.get" => representative_get,
        "classes.representative.set" => representative_set,
        "classes.dashboard" => dashboard,
        _ => return None,
    };
    Some(dispatch(state, req, op))
}
