//! Attendance records. Every write ends with a recount of the enrollment's
//! `presence_count`, inside the same transaction.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{enrollments, new_id, now_ts};
use crate::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::model::{AttendanceFact, AttendanceRecord, AttendanceStatus};

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        enrollment_id: r.get(1)?,
        date: r.get(2)?,
        status: r.get(3)?,
        note: r.get(4)?,
        recorded_at: r.get(5)?,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRow {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub class_id: String,
    pub class_name: String,
    pub student_id: String,
    pub student_name: String,
}

#[derive(Debug, Default, Clone)]
pub struct RecordFilter {
    pub class_id: Option<String>,
    pub professor_id: Option<String>,
    pub student_id: Option<String>,
    pub enrollment_id: Option<String>,
    pub status: Option<AttendanceStatus>,
    /// Inclusive.
    pub from: Option<NaiveDate>,
    /// Inclusive.
    pub to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn class(class_id: &str) -> Self {
        Self {
            class_id: Some(class_id.to_string()),
            ..Default::default()
        }
    }

    pub fn professor(professor_id: &str) -> Self {
        Self {
            professor_id: Some(professor_id.to_string()),
            ..Default::default()
        }
    }

    pub fn student(student_id: &str) -> Self {
        Self {
            student_id: Some(student_id.to_string()),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(" WHERE 1 = 1");
        let mut args: Vec<Value> = Vec::new();
        let mut eq = |column: &str, v: &Option<String>| {
            if let Some(v) = v {
                sql.push_str(&format!(" AND {} = ?", column));
                args.push(Value::Text(v.clone()));
            }
        };
        eq("c.id", &self.class_id);
        eq("c.professor_id", &self.professor_id);
        eq("e.student_id", &self.student_id);
        eq("e.id", &self.enrollment_id);
        if let Some(status) = self.status {
            sql.push_str(" AND a.status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(from) = self.from {
            sql.push_str(" AND a.date >= ?");
            args.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            sql.push_str(" AND a.date <= ?");
            args.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        (sql, args)
    }
}

const FROM_JOINS: &str = " FROM attendance_records a
     JOIN enrollments e ON e.id = a.enrollment_id
     JOIN classes c ON c.id = e.class_id
     JOIN students s ON s.id = e.student_id";

pub fn list(conn: &Connection, filter: &RecordFilter) -> ServiceResult<Vec<RecordRow>> {
    let (where_sql, args) = filter.where_clause();
    let sql = format!(
        "SELECT a.id, a.enrollment_id, a.date, a.status, a.note, a.recorded_at,
                c.id, c.name, s.id, s.name
         {}{}
         ORDER BY a.date DESC, c.name, s.name",
        FROM_JOINS, where_sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), |r| {
            Ok(RecordRow {
                record: record_from_row(r)?,
                class_id: r.get(6)?,
                class_name: r.get(7)?,
                student_id: r.get(8)?,
                student_name: r.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Flattened records for the aggregator, in date order.
pub fn load_facts(conn: &Connection, filter: &RecordFilter) -> ServiceResult<Vec<AttendanceFact>> {
    let (where_sql, args) = filter.where_clause();
    let sql = format!(
        "SELECT e.id, c.id, e.student_id, c.professor_id, a.date, a.status
         {}{}
         ORDER BY a.date, a.id",
        FROM_JOINS, where_sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let facts = stmt
        .query_map(params_from_iter(args), |r| {
            Ok(AttendanceFact {
                enrollment_id: r.get(0)?,
                class_id: r.get(1)?,
                student_id: r.get(2)?,
                professor_id: r.get(3)?,
                date: r.get(4)?,
                status: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(facts)
}

pub fn get(conn: &Connection, id: &str) -> ServiceResult<AttendanceRecord> {
    conn.query_row(
        "SELECT id, enrollment_id, date, status, note, recorded_at
         FROM attendance_records WHERE id = ?",
        [id],
        record_from_row,
    )
    .optional()?
    .ok_or_else(|| ServiceError::not_found("attendance record"))
}

/// Professor owning the class the record belongs to.
pub fn class_owner_of(conn: &Connection, record_id: &str) -> ServiceResult<String> {
    conn.query_row(
        "SELECT c.professor_id
         FROM attendance_records a
         JOIN enrollments e ON e.id = a.enrollment_id
         JOIN classes c ON c.id = e.class_id
         WHERE a.id = ?",
        [record_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| ServiceError::not_found("attendance record"))
}

/// Resets `presence_count` to the live number of Present records.
pub fn recompute_presence_count(conn: &Connection, enrollment_id: &str) -> ServiceResult<i64> {
    conn.execute(
        "UPDATE enrollments
         SET presence_count = (
           SELECT COUNT(*) FROM attendance_records
           WHERE enrollment_id = enrollments.id AND status = 'present'
         )
         WHERE id = ?",
        [enrollment_id],
    )?;
    Ok(conn.query_row(
        "SELECT presence_count FROM enrollments WHERE id = ?",
        [enrollment_id],
        |r| r.get(0),
    )?)
}

pub fn create(
    conn: &Connection,
    enrollment_id: &str,
    date: NaiveDate,
    status: AttendanceStatus,
    note: &str,
) -> ServiceResult<AttendanceRecord> {
    enrollments::get(conn, enrollment_id)?;
    let id = new_id();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO attendance_records(id, enrollment_id, date, status, note, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, enrollment_id, date, status, note, now_ts()),
    )
    .map_err(|e| conflict_on_unique(e, "attendance already recorded for this date"))?;
    recompute_presence_count(&tx, enrollment_id)?;
    tx.commit()?;
    get(conn, &id)
}

#[derive(Debug, Default)]
pub struct RecordPatch {
    pub date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub note: Option<String>,
}

pub fn update(conn: &Connection, id: &str, patch: &RecordPatch) -> ServiceResult<AttendanceRecord> {
    let current = get(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE attendance_records SET date = ?, status = ?, note = ?, recorded_at = ?
         WHERE id = ?",
        (
            patch.date.unwrap_or(current.date),
            patch.status.unwrap_or(current.status),
            patch.note.as_ref().unwrap_or(&current.note),
            now_ts(),
            id,
        ),
    )
    .map_err(|e| conflict_on_unique(e, "attendance already recorded for this date"))?;
    recompute_presence_count(&tx, &current.enrollment_id)?;
    tx.commit()?;
    get(conn, id)
}

pub fn delete(conn: &Connection, id: &str) -> ServiceResult<()> {
    let current = get(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM attendance_records WHERE id = ?", [id])?;
    recompute_presence_count(&tx, &current.enrollment_id)?;
    tx.commit()?;
    Ok(())
}

/// Inserts or overwrites the record for `(enrollment_id, date)`. The bool is
/// true when a new record was created.
pub fn upsert(
    conn: &Connection,
    enrollment_id: &str,
    date: NaiveDate,
    status: AttendanceStatus,
    note: &str,
) -> ServiceResult<(AttendanceRecord, bool)> {
    let tx = conn.unchecked_transaction()?;
    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM attendance_records WHERE enrollment_id = ? AND date = ?",
            (enrollment_id, date),
            |r| r.get(0),
        )
        .optional()?;
    let (id, created) = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE attendance_records SET status = ?, note = ?, recorded_at = ? WHERE id = ?",
                (status, note, now_ts(), &id),
            )?;
            (id, false)
        }
        None => {
            let id = new_id();
            tx.execute(
                "INSERT INTO attendance_records(id, enrollment_id, date, status, note, recorded_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (&id, enrollment_id, date, status, note, now_ts()),
            )?;
            (id, true)
        }
    };
    recompute_presence_count(&tx, enrollment_id)?;
    tx.commit()?;
    Ok((get(conn, &id)?, created))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
    pub note: String,
}

/// Outcome of one bulk entry. Failures carry the error code and message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResult {
    pub student_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MarkError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkError {
    pub code: &'static str,
    pub message: String,
}

/// Upserts one record per entry for `class_id` on `date`. Entries succeed or
/// fail independently; only storage failures abort the whole batch.
pub fn mark_class(
    conn: &Connection,
    class_id: &str,
    date: NaiveDate,
    entries: &[MarkEntry],
) -> ServiceResult<Vec<MarkResult>> {
    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let outcome = enrollments::find(conn, class_id, &entry.student_id)?
            .ok_or_else(|| ServiceError::NotFound("student is not enrolled in this class".into()))
            .and_then(|enrollment| upsert(conn, &enrollment.id, date, entry.status, &entry.note));
        let result = match outcome {
            Ok((record, created)) => MarkResult {
                student_id: entry.student_id.clone(),
                ok: true,
                record_id: Some(record.id),
                created: Some(created),
                error: None,
            },
            Err(e @ (ServiceError::NotFound(_) | ServiceError::Conflict(_))) => MarkResult {
                student_id: entry.student_id.clone(),
                ok: false,
                record_id: None,
                created: None,
                error: Some(MarkError {
                    code: e.code(),
                    message: e.to_string(),
                }),
            },
            Err(e) => return Err(e),
        };
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    fn live_present(conn: &Connection, enrollment_id: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM attendance_records WHERE enrollment_id = ? AND status = 'present'",
            [enrollment_id],
            |r| r.get(0),
        )
        .expect("count")
    }

    fn cached(conn: &Connection, enrollment_id: &str) -> i64 {
        enrollments::get(conn, enrollment_id).expect("enrollment").presence_count
    }

    #[test]
    fn counter_tracks_every_kind_of_write() {
        let conn = testing::conn();
        let p = testing::professor(&conn, "Zeca");
        let c = testing::class(&conn, "Statics", &p);
        let s = testing::student(&conn, "Alba", "R800");
        let e = testing::enroll(&conn, &c, &s);

        let r1 = create(&conn, &e, testing::d(2025, 3, 3), AttendanceStatus::Present, "")
            .expect("create");
        assert_eq!(cached(&conn, &e), 1);
        upsert(&conn, &e, testing::d(2025, 3, 4), AttendanceStatus::Present, "").expect("upsert");
        assert_eq!(cached(&conn, &e), 2);
        update(
            &conn,
            &r1.id,
            &RecordPatch {
                status: Some(AttendanceStatus::Absent),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(cached(&conn, &e), 1);
        let (r2, created) =
            upsert(&conn, &e, testing::d(2025, 3, 4), AttendanceStatus::Justified, "sick")
                .expect("overwrite");
        assert!(!created);
        assert_eq!(r2.note, "sick");
        assert_eq!(cached(&conn, &e), 0);
        delete(&conn, &r1.id).expect("delete");
        assert_eq!(cached(&conn, &e), live_present(&conn, &e));
    }

    #[test]
    fn duplicate_date_is_conflict() {
        let conn = testing::conn();
        let p = testing::professor(&conn, "Bento");
        let c = testing::class(&conn, "Optics", &p);
        let s = testing::student(&conn, "Cora", "R801");
        let e = testing::enroll(&conn, &c, &s);
        create(&conn, &e, testing::d(2025, 4, 1), AttendanceStatus::Present, "").expect("first");
        assert!(matches!(
            create(&conn, &e, testing::d(2025, 4, 1), AttendanceStatus::Absent, ""),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn bulk_mark_is_idempotent_and_isolates_bad_entries() {
        let conn = testing::conn();
        let p = testing::professor(&conn, "Dino");
        let c = testing::class(&conn, "Circuits", &p);
        let a = testing::student(&conn, "Edu", "R802");
        let b = testing::student(&conn, "Fabi", "R803");
        let outsider = testing::student(&conn, "Gil", "R804");
        testing::enroll(&conn, &c, &a);
        testing::enroll(&conn, &c, &b);

        let entries = vec![
            MarkEntry {
                student_id: a.clone(),
                status: AttendanceStatus::Present,
                note: String::new(),
            },
            MarkEntry {
                student_id: outsider.clone(),
                status: AttendanceStatus::Present,
                note: String::new(),
            },
            MarkEntry {
                student_id: b.clone(),
                status: AttendanceStatus::Absent,
                note: "late bus".into(),
            },
        ];
        let day = testing::d(2025, 5, 5);
        let first = mark_class(&conn, &c, day, &entries).expect("first");
        assert!(first[0].ok && first[2].ok);
        assert_eq!(first[0].created, Some(true));
        assert!(!first[1].ok);
        assert_eq!(first[1].error.as_ref().map(|e| e.code), Some("not_found"));

        let before = list(&conn, &RecordFilter::class(&c)).expect("list");
        let second = mark_class(&conn, &c, day, &entries).expect("second");
        assert_eq!(second[0].created, Some(false));
        assert_eq!(second[0].record_id, first[0].record_id);
        let after = list(&conn, &RecordFilter::class(&c)).expect("list");
        assert_eq!(before.len(), 2);
        assert_eq!(
            before.iter().map(|r| (&r.record.id, r.record.status)).collect::<Vec<_>>(),
            after.iter().map(|r| (&r.record.id, r.record.status)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn facts_respect_filters() {
        let conn = testing::conn();
        let p = testing::professor(&conn, "Hugo");
        let c = testing::class(&conn, "Acoustics", &p);
        let s = testing::student(&conn, "Iris", "R805");
        let e = testing::enroll(&conn, &c, &s);
        for (day, status) in [
            (1, AttendanceStatus::Present),
            (2, AttendanceStatus::Absent),
            (3, AttendanceStatus::Present),
        ] {
            upsert(&conn, &e, testing::d(2025, 6, day), status, "").expect("upsert");
        }
        let all = load_facts(&conn, &RecordFilter::professor(&p)).expect("facts");
        assert_eq!(all.len(), 3);
        let window = load_facts(
            &conn,
            &RecordFilter::student(&s).between(testing::d(2025, 6, 2), testing::d(2025, 6, 3)),
        )
        .expect("facts");
        assert_eq!(window.len(), 2);
        let present = load_facts(
            &conn,
            &RecordFilter {
                status: Some(AttendanceStatus::Present),
                ..RecordFilter::class(&c)
            },
        )
        .expect("facts");
        assert_eq!(present.len(), 2);
    }
}
