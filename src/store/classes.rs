use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{enrollments, exists, like_pattern, new_id, now_ts, students};
use crate::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::model::{Class, ClassStatus, Student};

const CLASS_COLS: &str = "c.id, c.name, c.description, c.professor_id, c.start_date, c.end_date,
     c.status, c.representative_id, c.created_at";

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        professor_id: r.get(3)?,
        start_date: r.get(4)?,
        end_date: r.get(5)?,
        status: r.get(6)?,
        representative_id: r.get(7)?,
        created_at: r.get(8)?,
    })
}

/// A class with the names and counts list views show next to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRow {
    #[serde(flatten)]
    pub class: Class,
    pub professor_name: String,
    pub representative_name: Option<String>,
    pub student_count: i64,
    pub is_running: bool,
}

const ROW_SELECT: &str = "SELECT c.id, c.name, c.description, c.professor_id, c.start_date,
        c.end_date, c.status, c.representative_id, c.created_at,
        p.name,
        r.name,
        (SELECT COUNT(*) FROM enrollments e WHERE e.class_id = c.id)
     FROM classes c
     JOIN professors p ON p.id = c.professor_id
     LEFT JOIN students r ON r.id = c.representative_id";

fn class_row_from_row(r: &Row<'_>, today: NaiveDate) -> rusqlite::Result<ClassRow> {
    let class = class_from_row(r)?;
    let is_running = class.is_running_on(today);
    Ok(ClassRow {
        class,
        professor_name: r.get(9)?,
        representative_name: r.get(10)?,
        student_count: r.get(11)?,
        is_running,
    })
}

#[derive(Debug, Default)]
pub struct ClassFilter {
    pub status: Option<ClassStatus>,
    pub professor_id: Option<String>,
    /// Matches class name, description or professor name.
    pub search: Option<String>,
    /// Only classes running on `today`.
    pub running_only: bool,
}

pub fn list(conn: &Connection, filter: &ClassFilter, today: NaiveDate) -> ServiceResult<Vec<ClassRow>> {
    let mut sql = format!("{} WHERE 1 = 1", ROW_SELECT);
    let mut args: Vec<Value> = Vec::new();
    if let Some(status) = filter.status {
        sql.push_str(" AND c.status = ?");
        args.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(pid) = &filter.professor_id {
        sql.push_str(" AND c.professor_id = ?");
        args.push(Value::Text(pid.clone()));
    }
    if let Some(term) = &filter.search {
        sql.push_str(
            " AND (c.name LIKE ? ESCAPE '\\' OR c.description LIKE ? ESCAPE '\\' OR p.name LIKE ? ESCAPE '\\')",
        );
        let pattern = like_pattern(term);
        for _ in 0..3 {
            args.push(Value::Text(pattern.clone()));
        }
    }
    if filter.running_only {
        sql.push_str(" AND c.status = 'active' AND c.start_date <= ? AND c.end_date >= ?");
        let day = today.format("%Y-%m-%d").to_string();
        args.push(Value::Text(day.clone()));
        args.push(Value::Text(day));
    }
    sql.push_str(" ORDER BY c.name, c.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), |r| class_row_from_row(r, today))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: &str) -> ServiceResult<Class> {
    let sql = format!("SELECT {} FROM classes c WHERE c.id = ?", CLASS_COLS);
    conn.query_row(&sql, [id], class_from_row)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("class"))
}

pub fn get_row(conn: &Connection, id: &str, today: NaiveDate) -> ServiceResult<ClassRow> {
    let sql = format!("{} WHERE c.id = ?", ROW_SELECT);
    conn.query_row(&sql, [id], |r| class_row_from_row(r, today))
        .optional()?
        .ok_or_else(|| ServiceError::not_found("class"))
}

/// Owning professor id, read from the store.
pub fn owner_of(conn: &Connection, id: &str) -> ServiceResult<String> {
    conn.query_row("SELECT professor_id FROM classes WHERE id = ?", [id], |r| {
        r.get(0)
    })
    .optional()?
    .ok_or_else(|| ServiceError::not_found("class"))
}

fn check_dates(start: NaiveDate, end: NaiveDate) -> ServiceResult<()> {
    if end < start {
        return Err(ServiceError::invalid(
            "endDate",
            "endDate must not be before startDate",
        ));
    }
    Ok(())
}

pub struct NewClass {
    pub name: String,
    pub description: String,
    pub professor_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ClassStatus,
}

pub fn create(conn: &Connection, new: &NewClass) -> ServiceResult<Class> {
    check_dates(new.start_date, new.end_date)?;
    if !exists(conn, "professors", &new.professor_id)? {
        return Err(ServiceError::not_found("professor"));
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO classes(id, name, description, professor_id, start_date, end_date,
                             status, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &new.name,
            &new.description,
            &new.professor_id,
            new.start_date,
            new.end_date,
            new.status,
            now_ts(),
        ),
    )?;
    get(conn, &id)
}

#[derive(Debug, Default)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub professor_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<ClassStatus>,
}

pub fn update(conn: &Connection, id: &str, patch: &ClassPatch) -> ServiceResult<Class> {
    let current = get(conn, id)?;
    let start = patch.start_date.unwrap_or(current.start_date);
    let end = patch.end_date.unwrap_or(current.end_date);
    check_dates(start, end)?;
    if let Some(pid) = &patch.professor_id {
        if !exists(conn, "professors", pid)? {
            return Err(ServiceError::not_found("professor"));
        }
    }
    conn.execute(
        "UPDATE classes
         SET name = ?, description = ?, professor_id = ?, start_date = ?, end_date = ?, status = ?
         WHERE id = ?",
        (
            patch.name.as_ref().unwrap_or(&current.name),
            patch.description.as_ref().unwrap_or(&current.description),
            patch.professor_id.as_ref().unwrap_or(&current.professor_id),
            start,
            end,
            patch.status.unwrap_or(current.status),
            id,
        ),
    )?;
    get(conn, id)
}

/// Removes the class with its enrollments and their records.
pub fn delete(conn: &Connection, id: &str) -> ServiceResult<()> {
    get(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance_records
         WHERE enrollment_id IN (SELECT id FROM enrollments WHERE class_id = ?)",
        [id],
    )?;
    tx.execute("DELETE FROM enrollments WHERE class_id = ?", [id])?;
    tx.execute("DELETE FROM classes WHERE id = ?", [id])?;
    tx.commit()?;
    tracing::info!(class_id = %id, "class deleted");
    Ok(())
}

pub fn representative(conn: &Connection, class_id: &str) -> ServiceResult<Option<Student>> {
    match get(conn, class_id)?.representative_id {
        Some(sid) => Ok(Some(students::get(conn, &sid)?)),
        None => Ok(None),
    }
}

/// Sets or clears the representative. The student must be enrolled in the
/// class and may represent at most one class.
pub fn set_representative(
    conn: &Connection,
    class_id: &str,
    student_id: Option<&str>,
) -> ServiceResult<Option<Student>> {
    get(conn, class_id)?;
    let student = match student_id {
        Some(sid) => {
            let student = students::get(conn, sid)?;
            if enrollments::find(conn, class_id, sid)?.is_none() {
                return Err(ServiceError::invalid(
                    "studentId",
                    "student is not enrolled in this class",
                ));
            }
            Some(student)
        }
        None => None,
    };
    conn.execute(
        "UPDATE classes SET representative_id = ? WHERE id = ?",
        (student_id, class_id),
    )
    .map_err(|e| conflict_on_unique(e, "student already represents another class"))?;
    Ok(student)
}
