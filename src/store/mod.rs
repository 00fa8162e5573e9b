//! SQLite-backed entity store. Every function takes a borrowed connection and
//! returns `ServiceResult`, so handlers can chain them with `?`.

pub mod attendance;
pub mod classes;
pub mod enrollments;
pub mod professors;
pub mod students;
pub mod users;

use rusqlite::{Connection, OptionalExtension};

use crate::error::ServiceResult;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// `%term%` for a case-insensitive LIKE; `%` and `_` in the term match
/// literally via `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

pub(crate) fn exists(conn: &Connection, table: &str, id: &str) -> ServiceResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    Ok(conn
        .query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use super::{classes, enrollments, professors, students};
    use crate::model::{ClassStatus, Gender};

    pub fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        crate::db::init_schema(&conn).expect("schema");
        conn
    }

    pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    pub fn professor(conn: &Connection, name: &str) -> String {
        professors::create(
            conn,
            &professors::NewProfessor {
                name: name.to_string(),
                email: format!("{}@school.test", name.to_lowercase()),
                department: "Science".to_string(),
                active: true,
                user_id: None,
            },
        )
        .expect("create professor")
        .id
    }

    pub fn student(conn: &Connection, name: &str, registration: &str) -> String {
        students::create(
            conn,
            &students::NewStudent {
                name: name.to_string(),
                registration: registration.to_string(),
                email: format!("{}@students.test", registration.to_lowercase()),
                course: "Physics".to_string(),
                birth_date: d(2004, 3, 9),
                gender: Gender::Undisclosed,
                user_id: None,
            },
        )
        .expect("create student")
        .id
    }

    pub fn class(conn: &Connection, name: &str, professor_id: &str) -> String {
        classes::create(
            conn,
            &classes::NewClass {
                name: name.to_string(),
                description: String::new(),
                professor_id: professor_id.to_string(),
                start_date: d(2025, 2, 1),
                end_date: d(2025, 12, 15),
                status: ClassStatus::Active,
            },
        )
        .expect("create class")
        .id
    }

    pub fn enroll(conn: &Connection, class_id: &str, student_id: &str) -> String {
        enrollments::create(conn, class_id, student_id)
            .expect("enroll")
            .id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" ana "), "%ana%");
        assert_eq!(like_pattern("50%_x"), "%50\\%\\_x%");
    }
}
