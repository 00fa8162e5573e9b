use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::ServiceResult;
use crate::ipc::helpers::{
    dispatch, nullable_str, optional_bool, optional_str, required_str, search_term, to_json, today,
    Op,
};
use crate::ipc::types::{AppState, Request};
use crate::permissions::{authorize, Action, Actor, Resource};
use crate::store::classes::{self, ClassFilter};
use crate::store::professors::{self, NewProfessor, ProfessorFilter, ProfessorPatch};
use crate::validate;

fn list(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::ProfessorDirectory)?;
    let filter = ProfessorFilter {
        department: optional_str(params, "department")?,
        active: optional_bool(params, "active")?,
        search: search_term(params)?,
    };
    let rows = professors::list(conn, &filter)?;
    Ok(json!({ "professors": to_json(&rows)? }))
}

/// Active professors with only their public fields.
fn public(conn: &Connection, actor: &Actor, _params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::ProfessorDirectory)?;
    let rows = professors::list(
        conn,
        &ProfessorFilter {
            active: Some(true),
            ..Default::default()
        },
    )?;
    let out: Vec<Value> = rows
        .into_iter()
        .map(|p| json!({ "id": p.id, "name": p.name, "department": p.department }))
        .collect();
    Ok(json!({ "professors": out }))
}

fn professor_classes(conn: &Connection, professor_id: &str, params: &Value) -> ServiceResult<Value> {
    let rows = classes::list(
        conn,
        &ClassFilter {
            professor_id: Some(professor_id.to_string()),
            ..Default::default()
        },
        today(params)?,
    )?;
    to_json(&rows)
}

fn get(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::ProfessorDirectory)?;
    let id = required_str(params, "professorId")?;
    let professor = professors::get(conn, &id)?;
    Ok(json!({
        "professor": to_json(&professor)?,
        "classes": professor_classes(conn, &id, params)?,
    }))
}

fn classes_of(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::ProfessorDirectory)?;
    let id = required_str(params, "professorId")?;
    professors::get(conn, &id)?;
    Ok(json!({ "classes": professor_classes(conn, &id, params)? }))
}

fn create(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Create, Resource::ProfessorDirectory)?;
    let new = NewProfessor {
        name: validate::text("name", &required_str(params, "name")?, validate::NAME_MAX)?,
        email: validate::email("email", &required_str(params, "email")?)?,
        department: validate::text(
            "department",
            &required_str(params, "department")?,
            validate::DEPARTMENT_MAX,
        )?,
        active: optional_bool(params, "active")?.unwrap_or(true),
        user_id: optional_str(params, "userId")?,
    };
    let professor = professors::create(conn, &new)?;
    tracing::info!(professor_id = %professor.id, "professor created");
    Ok(json!({ "professor": to_json(&professor)? }))
}

fn update(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Update, Resource::ProfessorDirectory)?;
    let id = required_str(params, "professorId")?;
    let patch = ProfessorPatch {
        name: optional_str(params, "name")?
            .map(|v| validate::text("name", &v, validate::NAME_MAX))
            .transpose()?,
        email: optional_str(params, "email")?
            .map(|v| validate::email("email", &v))
            .transpose()?,
        department: optional_str(params, "department")?
            .map(|v| validate::text("department", &v, validate::DEPARTMENT_MAX))
            .transpose()?,
        active: optional_bool(params, "active")?,
        user_id: nullable_str(params, "userId")?,
    };
    let professor = professors::update(conn, &id, &patch)?;
    Ok(json!({ "professor": to_json(&professor)? }))
}

fn delete(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Delete, Resource::ProfessorDirectory)?;
    let id = required_str(params, "professorId")?;
    professors::delete(conn, &id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "professors.list" => list,
        "professors.public" => public,
        "professors.get" => get,
        "professors.classes" => classes_of,
        "professors.create" => create,
        "professors.update" => update,
        "professors.delete" => delete,
        _ => return None,
    };
    Some(dispatch(state, req, op))
}
