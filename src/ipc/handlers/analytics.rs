//! Dashboards, the administrative overview and report, and public statistics.
//!
//! Handlers only gather rows from the store; every number is computed by the
//! composers in [`crate::reports`].

use chrono::{DateTime, NaiveDate};
use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{dispatch, optional_date, optional_str, to_json, today, Op};
use crate::ipc::types::{AppState, Request};
use crate::model::ClassStatus;
use crate::permissions::{authorize, Action, Actor, Resource};
use crate::reports::{
    self, ClassRef, EnrolledClass, EnrollmentRef, OverviewInput, ReportParams, StudentRef,
    TaughtClass, Window,
};
use crate::store::attendance::{self, RecordFilter};
use crate::store::classes::{self, ClassFilter, ClassRow};
use crate::store::professors::{self, ProfessorFilter};
use crate::store::students::{self, StudentFilter};
use crate::store::{enrollments, now_ts, users};

/// Explicit id, else the caller's own profile. An admin has no profile of
/// their own and must name one.
fn target_id(
    params: &Value,
    key: &str,
    own: Option<&str>,
    actor: &Actor,
) -> ServiceResult<String> {
    if let Some(id) = optional_str(params, key)? {
        return Ok(id);
    }
    match own {
        Some(id) => Ok(id.to_string()),
        None if actor.is_admin() => Err(ServiceError::invalid(key, format!("missing {}", key))),
        None => Err(ServiceError::denied("no profile linked to this account")),
    }
}

fn class_ref(row: &ClassRow) -> ClassRef {
    ClassRef {
        class_id: row.class.id.clone(),
        name: row.class.name.clone(),
        professor_id: row.class.professor_id.clone(),
        professor_name: row.professor_name.clone(),
        status: row.class.status,
        student_count: row.student_count,
    }
}

fn professor_dashboard(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = target_id(params, "professorId", actor.professor_id(), actor)?;
    authorize(actor, Action::Read, Resource::ProfessorDashboard { professor_id: &id })?;
    let professor = professors::get(conn, &id)?;
    let today = today(params)?;

    let rows = classes::list(
        conn,
        &ClassFilter {
            professor_id: Some(id.clone()),
            ..Default::default()
        },
        today,
    )?;
    let mut taught = Vec::with_capacity(rows.len());
    let mut roster = Vec::new();
    for row in &rows {
        taught.push(TaughtClass {
            class_id: row.class.id.clone(),
            name: row.class.name.clone(),
            status: row.class.status,
            student_count: row.student_count,
            start_date: row.class.start_date,
            end_date: row.class.end_date,
        });
        for e in enrollments::list(conn, Some(&row.class.id), None)? {
            roster.push(EnrollmentRef {
                enrollment_id: e.enrollment.id,
                student_id: e.enrollment.student_id,
                student_name: e.student_name,
                class_name: e.class_name,
            });
        }
    }
    let facts = attendance::load_facts(conn, &RecordFilter::professor(&id))?;
    let dashboard =
        reports::compose_professor_dashboard(&professor, today, &taught, &roster, &facts);
    to_json(&dashboard)
}

fn student_dashboard(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let id = target_id(params, "studentId", actor.student_id(), actor)?;
    authorize(actor, Action::Read, Resource::StudentDashboard { student_id: &id })?;
    let student = students::get(conn, &id)?;
    let today = today(params)?;

    let mut enrolled = Vec::new();
    let mut class_facts = Vec::new();
    for e in enrollments::list(conn, None, Some(&id))? {
        let class = classes::get_row(conn, &e.enrollment.class_id, today)?;
        class_facts.extend(attendance::load_facts(conn, &RecordFilter::class(&class.class.id))?);
        enrolled.push(EnrolledClass {
            enrollment_id: e.enrollment.id,
            class_id: class.class.id,
            class_name: class.class.name,
            professor_name: class.professor_name,
            status: class.class.status,
            presence_count: e.enrollment.presence_count,
        });
    }
    let dashboard = reports::compose_student_dashboard(&student, today, &enrolled, &class_facts);
    to_json(&dashboard)
}

/// Calendar day of an RFC 3339 timestamp; unparseable values are skipped.
fn timestamp_date(ts: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(ts).ok().map(|dt| dt.date_naive())
}

fn overview(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::SystemAnalytics)?;
    let today = today(params)?;

    let all_professors = professors::list(conn, &ProfessorFilter::default())?;
    let departments: Vec<(String, String)> = all_professors
        .iter()
        .map(|p| (p.id.clone(), p.department.clone()))
        .collect();
    let all_students = students::list(conn, &StudentFilter::default())?;
    let student_refs: Vec<StudentRef> = all_students
        .iter()
        .map(|s| StudentRef {
            student_id: s.id.clone(),
            name: s.name.clone(),
            registration: s.registration.clone(),
            course: s.course.clone(),
        })
        .collect();
    let class_refs: Vec<ClassRef> = classes::list(conn, &ClassFilter::default(), today)?
        .iter()
        .map(class_ref)
        .collect();
    let all_enrollments = enrollments::list(conn, None, None)?;
    let enrollment_dates: Vec<NaiveDate> = all_enrollments
        .iter()
        .filter_map(|e| timestamp_date(&e.enrollment.enrolled_at))
        .collect();
    let facts = attendance::load_facts(conn, &RecordFilter::default())?;

    let overview = reports::compose_overview(&OverviewInput {
        today,
        active_professors: all_professors.iter().filter(|p| p.active).count(),
        total_students: all_students.len(),
        active_classes: class_refs
            .iter()
            .filter(|c| c.status == ClassStatus::Active)
            .count(),
        total_enrollments: all_enrollments.len(),
        departments: &departments,
        classes: &class_refs,
        students: &student_refs,
        enrollment_dates: &enrollment_dates,
        facts: &facts,
    });
    to_json(&overview)
}

fn report(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::SystemAnalytics)?;
    let default = Window::trailing(today(params)?, reports::REPORT_WINDOW_DAYS);
    let window = Window {
        from: optional_date(params, "from")?.unwrap_or(default.from),
        to: optional_date(params, "to")?.unwrap_or(default.to),
    };
    if window.from > window.to {
        return Err(ServiceError::invalid("from", "from must not be after to"));
    }
    let format = optional_str(params, "format")?.unwrap_or_else(|| "json".to_string());
    if format != "json" {
        return Err(ServiceError::invalid("format", "format must be json"));
    }
    let class_id = optional_str(params, "classId")?;
    let focus = class_id
        .as_deref()
        .map(|id| classes::get(conn, id))
        .transpose()?;

    let class_refs: Vec<ClassRef> = classes::list(conn, &ClassFilter::default(), window.to)?
        .iter()
        .map(class_ref)
        .collect();
    let filter = RecordFilter {
        class_id: class_id.clone(),
        ..Default::default()
    }
    .between(window.from, window.to);
    let facts = attendance::load_facts(conn, &filter)?;
    let generated_by = match actor.user_id() {
        Some(id) => users::get(conn, id)?.username,
        None => String::new(),
    };

    let report = reports::compose_report(
        window,
        ReportParams { class_id, format },
        focus.as_ref().map(|c| c.name.as_str()),
        &class_refs,
        &facts,
        now_ts(),
        generated_by,
    );
    tracing::info!(from = %window.from, to = %window.to, "presence report generated");
    to_json(&report)
}

fn public_stats(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::PublicStatistics)?;
    let active_professors = professors::list(
        conn,
        &ProfessorFilter {
            active: Some(true),
            ..Default::default()
        },
    )?
    .len();
    let total_students = students::list(conn, &StudentFilter::default())?.len();
    let class_refs: Vec<ClassRef> = classes::list(conn, &ClassFilter::default(), today(params)?)?
        .iter()
        .map(class_ref)
        .collect();
    let active_classes = class_refs
        .iter()
        .filter(|c| c.status == ClassStatus::Active)
        .count();
    let facts = attendance::load_facts(conn, &RecordFilter::default())?;
    let stats = reports::compose_public_stats(
        active_professors,
        total_students,
        active_classes,
        &class_refs,
        &facts,
    );
    Ok(json!({ "stats": to_json(&stats)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "analytics.professorDashboard" => professor_dashboard,
        "analytics.studentDashboard" => student_dashboard,
        "analytics.overview" => overview,
        "analytics.report" => report,
        "stats.public" => public_stats,
        _ => return None,
    };
    Some(dispatch(state, req, op))
}
