use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use super::{like_pattern, new_id, now_ts, users};
use crate::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::model::Professor;

const PROFESSOR_COLS: &str = "id, name, email, department, active, created_at, user_id";

fn professor_from_row(r: &Row<'_>) -> rusqlite::Result<Professor> {
    Ok(Professor {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        department: r.get(3)?,
        active: r.get::<_, i64>(4)? != 0,
        created_at: r.get(5)?,
        user_id: r.get(6)?,
    })
}

#[derive(Debug, Default)]
pub struct ProfessorFilter {
    pub department: Option<String>,
    pub active: Option<bool>,
    /// Matches name, email or department.
    pub search: Option<String>,
}

pub fn list(conn: &Connection, filter: &ProfessorFilter) -> ServiceResult<Vec<Professor>> {
    let mut sql = format!("SELECT {} FROM professors WHERE 1 = 1", PROFESSOR_COLS);
    let mut args: Vec<Value> = Vec::new();
    if let Some(dep) = &filter.department {
        sql.push_str(" AND department = ? COLLATE NOCASE");
        args.push(Value::Text(dep.clone()));
    }
    if let Some(active) = filter.active {
        sql.push_str(" AND active = ?");
        args.push(Value::Integer(active as i64));
    }
    if let Some(term) = &filter.search {
        sql.push_str(
            " AND (name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\' OR department LIKE ? ESCAPE '\\')",
        );
        let pattern = like_pattern(term);
        for _ in 0..3 {
            args.push(Value::Text(pattern.clone()));
        }
    }
    sql.push_str(" ORDER BY name, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), professor_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: &str) -> ServiceResult<Professor> {
    let sql = format!("SELECT {} FROM professors WHERE id = ?", PROFESSOR_COLS);
    conn.query_row(&sql, [id], professor_from_row)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("professor"))
}

pub struct NewProfessor {
    pub name: String,
    pub email: String,
    pub department: String,
    pub active: bool,
    pub user_id: Option<String>,
}

pub fn create(conn: &Connection, new: &NewProfessor) -> ServiceResult<Professor> {
    if let Some(user_id) = new.user_id.as_deref() {
        users::ensure_linkable(conn, user_id, None)?;
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO professors(id, name, email, department, active, created_at, user_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &new.name,
            &new.email,
            &new.department,
            new.active as i64,
            now_ts(),
            &new.user_id,
        ),
    )
    .map_err(|e| conflict_on_unique(e, "professor email or user already in use"))?;
    get(conn, &id)
}

#[derive(Debug, Default)]
pub struct ProfessorPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub active: Option<bool>,
    /// `Some(None)` unlinks the user.
    pub user_id: Option<Option<String>>,
}

pub fn update(conn: &Connection, id: &str, patch: &ProfessorPatch) -> ServiceResult<Professor> {
    let current = get(conn, id)?;
    if let Some(Some(user_id)) = patch.user_id.as_ref() {
        users::ensure_linkable(conn, user_id, Some(id))?;
    }
    let user_id = match &patch.user_id {
        Some(v) => v.clone(),
        None => current.user_id.clone(),
    };
    conn.execute(
        "UPDATE professors
         SET name = ?, email = ?, department = ?, active = ?, user_id = ?
         WHERE id = ?",
        (
            patch.name.as_ref().unwrap_or(&current.name),
            patch.email.as_ref().unwrap_or(&current.email),
            patch.department.as_ref().unwrap_or(&current.department),
            patch.active.unwrap_or(current.active) as i64,
            &user_id,
            id,
        ),
    )
    .map_err(|e| conflict_on_unique(e, "professor email or user already in use"))?;
    get(conn, id)
}

pub fn class_count(conn: &Connection, id: &str) -> ServiceResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM classes WHERE professor_id = ?",
        [id],
        |r| r.get(0),
    )?)
}

/// Deleting a professor who still owns classes is refused, never cascaded.
pub fn delete(conn: &Connection, id: &str) -> ServiceResult<()> {
    get(conn, id)?;
    let owned = class_count(conn, id)?;
    if owned > 0 {
        return Err(ServiceError::Conflict(format!(
            "professor still owns {} class(es)",
            owned
        )));
    }
    conn.execute("DELETE FROM professors WHERE id = ?", [id])?;
    tracing::info!(professor_id = %id, "professor deleted");
    Ok(())
}
