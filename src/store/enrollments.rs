use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{exists, new_id, now_ts};
use crate::calc;
use crate::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::model::Enrollment;

fn enrollment_from_row(r: &Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        student_id: r.get(2)?,
        enrolled_at: r.get(3)?,
        presence_count: r.get(4)?,
    })
}

/// Enrollment with class/student names and a presence rate counted from the
/// records themselves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRow {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub class_name: String,
    pub student_name: String,
    pub student_registration: String,
    pub total_records: i64,
    pub presence_rate: f64,
}

const ROW_SELECT: &str = "SELECT e.id, e.class_id, e.student_id, e.enrolled_at, e.presence_count,
        c.name, s.name, s.registration,
        (SELECT COUNT(*) FROM attendance_records a WHERE a.enrollment_id = e.id),
        (SELECT COUNT(*) FROM attendance_records a
          WHERE a.enrollment_id = e.id AND a.status = 'present')
     FROM enrollments e
     JOIN classes c ON c.id = e.class_id
     JOIN students s ON s.id = e.student_id";

fn enrollment_row_from_row(r: &Row<'_>) -> rusqlite::Result<EnrollmentRow> {
    let total: i64 = r.get(8)?;
    let present: i64 = r.get(9)?;
    Ok(EnrollmentRow {
        enrollment: enrollment_from_row(r)?,
        class_name: r.get(5)?,
        student_name: r.get(6)?,
        student_registration: r.get(7)?,
        total_records: total,
        presence_rate: calc::round_2_decimals(calc::ratio_percent(
            present as usize,
            total as usize,
        )),
    })
}

pub fn list(
    conn: &Connection,
    class_id: Option<&str>,
    student_id: Option<&str>,
) -> ServiceResult<Vec<EnrollmentRow>> {
    let mut sql = format!("{} WHERE 1 = 1", ROW_SELECT);
    let mut args: Vec<Value> = Vec::new();
    if let Some(cid) = class_id {
        sql.push_str(" AND e.class_id = ?");
        args.push(Value::Text(cid.to_string()));
    }
    if let Some(sid) = student_id {
        sql.push_str(" AND e.student_id = ?");
        args.push(Value::Text(sid.to_string()));
    }
    sql.push_str(" ORDER BY c.name, s.name, e.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), enrollment_row_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: &str) -> ServiceResult<Enrollment> {
    conn.query_row(
        "SELECT id, class_id, student_id, enrolled_at, presence_count
         FROM enrollments WHERE id = ?",
        [id],
        enrollment_from_row,
    )
    .optional()?
    .ok_or_else(|| ServiceError::not_found("enrollment"))
}

pub fn get_row(conn: &Connection, id: &str) -> ServiceResult<EnrollmentRow> {
    let sql = format!("{} WHERE e.id = ?", ROW_SELECT);
    conn.query_row(&sql, [id], enrollment_row_from_row)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("enrollment"))
}

pub fn find(conn: &Connection, class_id: &str, student_id: &str) -> ServiceResult<Option<Enrollment>> {
    Ok(conn
        .query_row(
            "SELECT id, class_id, student_id, enrolled_at, presence_count
             FROM enrollments WHERE class_id = ? AND student_id = ?",
            (class_id, student_id),
            enrollment_from_row,
        )
        .optional()?)
}

pub fn create(conn: &Connection, class_id: &str, student_id: &str) -> ServiceResult<Enrollment> {
    if !exists(conn, "classes", class_id)? {
        return Err(ServiceError::not_found("class"));
    }
    if !exists(conn, "students", student_id)? {
        return Err(ServiceError::not_found("student"));
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO enrollments(id, class_id, student_id, enrolled_at, presence_count)
         VALUES(?, ?, ?, ?, 0)",
        (&id, class_id, student_id, now_ts()),
    )
    .map_err(|e| conflict_on_unique(e, "student already enrolled in this class"))?;
    tracing::debug!(enrollment_id = %id, class_id, student_id, "student enrolled");
    get(conn, &id)
}

/// Removes the enrollment and its records. A representative slot held by
/// this student in this class is cleared.
pub fn delete(conn: &Connection, id: &str) -> ServiceResult<()> {
    let e = get(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE classes SET representative_id = NULL
         WHERE id = ? AND representative_id = ?",
        (&e.class_id, &e.student_id),
    )?;
    tx.execute("DELETE FROM attendance_records WHERE enrollment_id = ?", [id])?;
    tx.execute("DELETE FROM enrollments WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(())
}
