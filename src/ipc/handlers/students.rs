use rusqlite::Connection;
use serde_json::{json, Value};

use crate::calc;
use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{
    dispatch, nullable_str, optional_date, optional_gender, optional_str, required_date,
    required_str, search_term, to_json, today, Op,
};
use crate::ipc::types::{AppState, Request};
use crate::permissions::{authorize, Action, Actor, Resource};
use crate::store::attendance::{self, RecordFilter};
use crate::store::enrollments;
use crate::store::students::{self, NewStudent, StudentFilter, StudentPatch};
use crate::validate;

fn list(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::StudentDirectory)?;
    let filter = StudentFilter {
        course: optional_str(params, "course")?,
        gender: optional_gender(params, "gender")?,
        search: search_term(params)?,
    };
    let rows = students::list(conn, &filter)?;
    Ok(json!({ "students": to_json(&rows)? }))
}

fn get(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::StudentDirectory)?;
    let id = required_str(params, "studentId")?;
    let student = students::get(conn, &id)?;
    let age = student.age_on(today(params)?);
    let enrolled = enrollments::list(conn, None, Some(&id))?;
    Ok(json!({
        "student": to_json(&student)?,
        "age": age,
        "enrollments": to_json(&enrolled)?,
    }))
}

fn create(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Create, Resource::StudentDirectory)?;
    let new = NewStudent {
        name: validate::text("name", &required_str(params, "name")?, validate::NAME_MAX)?,
        registration: validate::text(
            "registration",
            &required_str(params, "registration")?,
            validate::REGISTRATION_MAX,
        )?,
        email: validate::email("email", &required_str(params, "email")?)?,
        course: validate::text("course", &required_str(params, "course")?, validate::COURSE_MAX)?,
        birth_date: required_date(params, "birthDate")?,
        gender: optional_gender(params, "gender")?
            .ok_or_else(|| ServiceError::invalid("gender", "missing gender"))?,
        user_id: optional_str(params, "userId")?,
    };
    let student = students::create(conn, &new)?;
    tracing::info!(student_id = %student.id, "student created");
    Ok(json!({ "student": to_json(&student)? }))
}

fn update(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Update, Resource::StudentDirectory)?;
    let id = required_str(params, "studentId")?;
    let patch = StudentPatch {
        name: optional_str(params, "name")?
            .map(|v| validate::text("name", &v, validate::NAME_MAX))
            .transpose()?,
        registration: optional_str(params, "registration")?
            .map(|v| validate::text("registration", &v, validate::REGISTRATION_MAX))
            .transpose()?,
        email: optional_str(params, "email")?
            .map(|v| validate::email("email", &v))
            .transpose()?,
        course: optional_str(params, "course")?
            .map(|v| validate::text("course", &v, validate::COURSE_MAX))
            .transpose()?,
        birth_date: optional_date(params, "birthDate")?,
        gender: optional_gender(params, "gender")?,
        user_id: nullable_str(params, "userId")?,
    };
    let student = students::update(conn, &id, &patch)?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn delete(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Delete, Resource::StudentDirectory)?;
    let id = required_str(params, "studentId")?;
    students::delete(conn, &id)?;
    Ok(json!({ "deleted": true }))
}

/// Full attendance history of one student with their overall rates.
fn attendance_history(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = required_str(params, "studentId")?;
    authorize(
        actor,
        Action::Read,
        Resource::StudentAttendance { student_id: &id },
    )?;
    let student = students::get(conn, &id)?;
    let filter = RecordFilter::student(&student.id);
    let records = attendance::list(conn, &filter)?;
    let facts = attendance::load_facts(conn, &filter)?;
    Ok(json!({
        "student": to_json(&student)?,
        "summary": to_json(&calc::tally(&facts).summary())?,
        "records": to_json(&records)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "students.list" => list,
        "students.get" => get,
        "students.create" => create,
        "students.update" => update,
        "students.delete" => delete,
        "students.attendance" => attendance_history,
        _ => return None,
    };
    Some(dispatch(state, req, op))
}
