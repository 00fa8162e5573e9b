use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use super::{like_pattern, new_id, now_ts, users};
use crate::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::model::{Gender, Student};

const STUDENT_COLS: &str =
    "id, name, registration, email, course, birth_date, gender, created_at, user_id";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        registration: r.get(2)?,
        email: r.get(3)?,
        course: r.get(4)?,
        birth_date: r.get(5)?,
        gender: r.get(6)?,
        created_at: r.get(7)?,
        user_id: r.get(8)?,
    })
}

#[derive(Debug, Default)]
pub struct StudentFilter {
    pub course: Option<String>,
    pub gender: Option<Gender>,
    /// Matches name, registration or email.
    pub search: Option<String>,
}

pub fn list(conn: &Connection, filter: &StudentFilter) -> ServiceResult<Vec<Student>> {
    let mut sql = format!("SELECT {} FROM students WHERE 1 = 1", STUDENT_COLS);
    let mut args: Vec<Value> = Vec::new();
    if let Some(course) = &filter.course {
        sql.push_str(" AND course = ? COLLATE NOCASE");
        args.push(Value::Text(course.clone()));
    }
    if let Some(gender) = filter.gender {
        sql.push_str(" AND gender = ?");
        args.push(Value::Text(gender.as_str().to_string()));
    }
    if let Some(term) = &filter.search {
        sql.push_str(
            " AND (name LIKE ? ESCAPE '\\' OR registration LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\')",
        );
        let pattern = like_pattern(term);
        for _ in 0..3 {
            args.push(Value::Text(pattern.clone()));
        }
    }
    sql.push_str(" ORDER BY name, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: &str) -> ServiceResult<Student> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLS);
    conn.query_row(&sql, [id], student_from_row)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("student"))
}

pub struct NewStudent {
    pub name: String,
    pub registration: String,
    pub email: String,
    pub course: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub user_id: Option<String>,
}

pub fn create(conn: &Connection, new: &NewStudent) -> ServiceResult<Student> {
    if let Some(user_id) = new.user_id.as_deref() {
        users::ensure_linkable(conn, user_id, None)?;
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO students(id, name, registration, email, course, birth_date, gender,
                              created_at, user_id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &new.name,
            &new.registration,
            &new.email,
            &new.course,
            new.birth_date,
            new.gender,
            now_ts(),
            &new.user_id,
        ),
    )
    .map_err(|e| conflict_on_unique(e, "registration, email or user already in use"))?;
    get(conn, &id)
}

#[derive(Debug, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub registration: Option<String>,
    pub email: Option<String>,
    pub course: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    /// `Some(None)` unlinks the user.
    pub user_id: Option<Option<String>>,
}

pub fn update(conn: &Connection, id: &str, patch: &StudentPatch) -> ServiceResult<Student> {
    let current = get(conn, id)?;
    if let Some(Some(user_id)) = patch.user_id.as_ref() {
        users::ensure_linkable(conn, user_id, Some(id))?;
    }
    let user_id = match &patch.user_id {
        Some(v) => v.clone(),
        None => current.user_id.clone(),
    };
    conn.execute(
        "UPDATE students
         SET name = ?, registration = ?, email = ?, course = ?, birth_date = ?, gender = ?,
             user_id = ?
         WHERE id = ?",
        (
            patch.name.as_ref().unwrap_or(&current.name),
            patch.registration.as_ref().unwrap_or(&current.registration),
            patch.email.as_ref().unwrap_or(&current.email),
            patch.course.as_ref().unwrap_or(&current.course),
            patch.birth_date.unwrap_or(current.birth_date),
            patch.gender.unwrap_or(current.gender),
            &user_id,
            id,
        ),
    )
    .map_err(|e| conflict_on_unique(e, "registration, email or user already in use"))?;
    get(conn, id)
}

/// Removes the student with their enrollments and records, and clears any
/// representative slot they held.
pub fn delete(conn: &Connection, id: &str) -> ServiceResult<()> {
    get(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE classes SET representative_id = NULL WHERE representative_id = ?",
        [id],
    )?;
    tx.execute(
        "DELETE FROM attendance_records
         WHERE enrollment_id IN (SELECT id FROM enrollments WHERE student_id = ?)",
        [id],
    )?;
    tx.execute("DELETE FROM enrollments WHERE student_id = ?", [id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    tx.commit()?;
    tracing::info!(student_id = %id, "student deleted");
    Ok(())
}
