//! Dashboard and report payloads.
//!
//! The composers are pure: handlers load entities and attendance facts from
//! the store, and everything here is arithmetic over those inputs plus the
//! fixed policy thresholds below. Rates stay raw for every comparison and are
//! rounded only when written into a payload.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::calc::{self, ClassComparison, RateSummary, StatusTally};
use crate::model::{AttendanceFact, AttendanceStatus, ClassStatus, Professor, Student};

pub const STUDENT_MIN_PRESENCE: f64 = 75.0;
pub const CLASS_GAP_LIMIT: f64 = -10.0;
pub const SYSTEM_MIN_PRESENCE: f64 = 80.0;
pub const LOW_CLASS_PRESENCE: f64 = 70.0;
pub const HIGH_ABSENCE: f64 = 30.0;
pub const EXCELLENT_PRESENCE: f64 = 90.0;

const TOP_CLASSES: usize = 5;
const MOST_ABSENT: usize = 5;
const LOW_CLASS_ALERTS: usize = 5;
const HIGH_ABSENCE_ALERTS: usize = 10;

pub const PROFESSOR_WINDOW_DAYS: i64 = 30;
pub const STUDENT_WINDOW_DAYS: i64 = 180;
pub const GROWTH_WINDOW_DAYS: i64 = 180;
pub const REPORT_WINDOW_DAYS: i64 = 30;
/// Label only: overview totals count every record on file.
pub const OVERVIEW_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub action: String,
}

impl Recommendation {
    fn new(priority: Priority, title: &str, message: String, action: String) -> Self {
        Self {
            priority,
            title: title.to_string(),
            message,
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Window {
    /// The `days` days leading up to and including `today`, clamped at the
    /// earliest representable date.
    pub fn trailing(today: NaiveDate, days: i64) -> Self {
        Self {
            from: today
                .checked_sub_signed(Duration::days(days))
                .unwrap_or(NaiveDate::MIN),
            to: today,
        }
    }

    fn select(&self, facts: &[AttendanceFact]) -> Vec<AttendanceFact> {
        calc::within(facts, self.from, self.to)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRate {
    pub month: String,
    pub total: usize,
    pub present: usize,
    pub presence_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayRate {
    pub day: &'static str,
    pub total: usize,
    pub presence_rate: f64,
}

fn monthly_rates(facts: &[AttendanceFact]) -> Vec<MonthlyRate> {
    calc::bucket_by_month(facts)
        .into_iter()
        .map(|b| MonthlyRate {
            month: calc::month_label(b.key),
            total: b.tally.total(),
            present: b.tally.present,
            presence_rate: calc::round_2_decimals(b.tally.presence_rate()),
        })
        .collect()
}

fn weekday_rates(facts: &[AttendanceFact]) -> Vec<WeekdayRate> {
    calc::bucket_by_weekday(facts)
        .into_iter()
        .map(|b| WeekdayRate {
            day: calc::weekday_label(b.key),
            total: b.tally.total(),
            presence_rate: calc::round_2_decimals(b.tally.presence_rate()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Student dashboard

/// One of the student's enrollments with the class details the dashboard
/// names.
#[derive(Debug, Clone)]
pub struct EnrolledClass {
    pub enrollment_id: String,
    pub class_id: String,
    pub class_name: String,
    pub professor_name: String,
    pub status: ClassStatus,
    pub presence_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCard {
    pub id: String,
    pub name: String,
    pub registration: String,
    pub course: String,
    pub age: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTotals {
    pub total_classes: usize,
    pub active_classes: usize,
    #[serde(flatten)]
    pub rates: RateSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPerformance {
    pub class_id: String,
    pub class_name: String,
    pub professor_name: String,
    pub status: ClassStatus,
    pub my_presence_rate: f64,
    pub class_presence_rate: f64,
    pub difference: f64,
    pub presence_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student: StudentCard,
    pub totals: StudentTotals,
    pub per_class: Vec<ClassPerformance>,
    pub monthly: Vec<MonthlyRate>,
    pub window: Window,
    pub recommendations: Vec<Recommendation>,
}

pub fn student_recommendations(
    overall: &StatusTally,
    per_class: &[(&EnrolledClass, ClassComparison)],
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if overall.presence_rate() < STUDENT_MIN_PRESENCE {
        out.push(Recommendation::new(
            Priority::High,
            "Low attendance",
            format!(
                "Your presence rate is below {:.0}%. Improving your attendance is important.",
                STUDENT_MIN_PRESENCE
            ),
            "Try not to miss the upcoming lessons.".to_string(),
        ));
    }
    for (class, cmp) in per_class {
        let diff = cmp.difference();
        if diff < CLASS_GAP_LIMIT {
            out.push(Recommendation::new(
                Priority::Medium,
                "Below class average",
                format!(
                    "Your presence in {} is {:.1} points below the class average.",
                    class.class_name,
                    diff.abs()
                ),
                format!(
                    "Talk to professor {} about how to catch up.",
                    class.professor_name
                ),
            ));
        }
    }
    if out.is_empty() {
        out.push(Recommendation::new(
            Priority::Low,
            "Good standing",
            "Your attendance is in good shape. Keep it up!".to_string(),
            "Keep attending and keep up the good work.".to_string(),
        ));
    }
    out
}

/// `class_facts` must hold every record of every class in `classes`.
pub fn compose_student_dashboard(
    student: &Student,
    today: NaiveDate,
    classes: &[EnrolledClass],
    class_facts: &[AttendanceFact],
) -> StudentDashboard {
    let own: Vec<AttendanceFact> = class_facts
        .iter()
        .filter(|f| f.student_id == student.id)
        .cloned()
        .collect();
    let overall = calc::tally(&own);

    let pairs: Vec<(String, String)> = classes
        .iter()
        .map(|c| (c.enrollment_id.clone(), c.class_id.clone()))
        .collect();
    let comparisons = calc::compare_with_classes(&pairs, class_facts);
    let per_class: Vec<(&EnrolledClass, ClassComparison)> =
        classes.iter().zip(comparisons).collect();

    let window = Window::trailing(today, STUDENT_WINDOW_DAYS);
    let recommendations = student_recommendations(&overall, &per_class);

    StudentDashboard {
        student: StudentCard {
            id: student.id.clone(),
            name: student.name.clone(),
            registration: student.registration.clone(),
            course: student.course.clone(),
            age: student.age_on(today),
        },
        totals: StudentTotals {
            total_classes: classes.len(),
            active_classes: classes
                .iter()
                .filter(|c| c.status == ClassStatus::Active)
                .count(),
            rates: overall.summary(),
        },
        per_class: per_class
            .iter()
            .map(|(class, cmp)| ClassPerformance {
                class_id: class.class_id.clone(),
                class_name: class.class_name.clone(),
                professor_name: class.professor_name.clone(),
                status: class.status,
                my_presence_rate: calc::round_2_decimals(cmp.student.presence_rate()),
                class_presence_rate: calc::round_2_decimals(cmp.class.presence_rate()),
                difference: calc::round_2_decimals(cmp.difference()),
                presence_count: class.presence_count,
            })
            .collect(),
        monthly: monthly_rates(&window.select(&own)),
        window,
        recommendations,
    }
}

// ---------------------------------------------------------------------------
// Professor dashboard

#[derive(Debug, Clone)]
pub struct TaughtClass {
    pub class_id: String,
    pub name: String,
    pub status: ClassStatus,
    pub student_count: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct EnrollmentRef {
    pub enrollment_id: String,
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorCard {
    pub id: String,
    pub name: String,
    pub department: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorTotals {
    pub total_classes: usize,
    pub active_classes: usize,
    pub completed_classes: usize,
    pub total_students: usize,
    #[serde(flatten)]
    pub rates: RateSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRanking {
    pub class_id: String,
    pub name: String,
    pub status: ClassStatus,
    pub student_count: i64,
    pub presence_rate: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceRanking {
    pub enrollment_id: String,
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub total: usize,
    pub absences: usize,
    pub absence_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorDashboard {
    pub professor: ProfessorCard,
    pub totals: ProfessorTotals,
    pub top_classes: Vec<ClassRanking>,
    pub by_weekday: Vec<WeekdayRate>,
    pub most_absent: Vec<AbsenceRanking>,
    pub window: Window,
}

/// `facts` must hold every record of the professor's classes.
pub fn compose_professor_dashboard(
    professor: &Professor,
    today: NaiveDate,
    classes: &[TaughtClass],
    enrollments: &[EnrollmentRef],
    facts: &[AttendanceFact],
) -> ProfessorDashboard {
    let by_class = calc::tally_by(facts, |f| f.class_id.as_str());
    let by_enrollment = calc::tally_by(facts, |f| f.enrollment_id.as_str());

    let mut ranked: Vec<(&TaughtClass, StatusTally)> = classes
        .iter()
        .map(|c| (c, by_class.get(&c.class_id).copied().unwrap_or_default()))
        .collect();
    calc::rank_by_presence(&mut ranked);

    let mut absent: Vec<(&EnrollmentRef, StatusTally)> = enrollments
        .iter()
        .map(|e| (e, by_enrollment.get(&e.enrollment_id).copied().unwrap_or_default()))
        .collect();
    calc::rank_by_absence(&mut absent);

    let window = Window::trailing(today, PROFESSOR_WINDOW_DAYS);
    let count_status = |s: ClassStatus| classes.iter().filter(|c| c.status == s).count();

    ProfessorDashboard {
        professor: ProfessorCard {
            id: professor.id.clone(),
            name: professor.name.clone(),
            department: professor.department.clone(),
            email: professor.email.clone(),
        },
        totals: ProfessorTotals {
            total_classes: classes.len(),
            active_classes: count_status(ClassStatus::Active),
            completed_classes: count_status(ClassStatus::Completed),
            total_students: enrollments.len(),
            rates: calc::tally(facts).summary(),
        },
        top_classes: ranked
            .iter()
            .take(TOP_CLASSES)
            .map(|(c, t)| ClassRanking {
                class_id: c.class_id.clone(),
                name: c.name.clone(),
                status: c.status,
                student_count: c.student_count,
                presence_rate: calc::round_2_decimals(t.presence_rate()),
                start_date: c.start_date,
                end_date: c.end_date,
            })
            .collect(),
        by_weekday: weekday_rates(&window.select(facts)),
        most_absent: absent
            .iter()
            .take(MOST_ABSENT)
            .map(|(e, t)| AbsenceRanking {
                enrollment_id: e.enrollment_id.clone(),
                student_id: e.student_id.clone(),
                student_name: e.student_name.clone(),
                class_name: e.class_name.clone(),
                total: t.total(),
                absences: t.absent,
                absence_rate: calc::round_2_decimals(t.absence_rate()),
            })
            .collect(),
        window,
    }
}

// ---------------------------------------------------------------------------
// Class dashboard

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub class_id: String,
    pub class_name: String,
    pub total_students: usize,
    #[serde(flatten)]
    pub rates: RateSummary,
}

pub fn class_statistics(
    class_id: &str,
    class_name: &str,
    total_students: usize,
    facts: &[AttendanceFact],
) -> ClassStatistics {
    ClassStatistics {
        class_id: class_id.to_string(),
        class_name: class_name.to_string(),
        total_students,
        rates: calc::tally(facts).summary(),
    }
}

// ---------------------------------------------------------------------------
// Administrative overview

#[derive(Debug, Clone)]
pub struct ClassRef {
    pub class_id: String,
    pub name: String,
    pub professor_id: String,
    pub professor_name: String,
    pub status: ClassStatus,
    pub student_count: i64,
}

#[derive(Debug, Clone)]
pub struct StudentRef {
    pub student_id: String,
    pub name: String,
    pub registration: String,
    pub course: String,
}

pub struct OverviewInput<'a> {
    pub today: NaiveDate,
    pub active_professors: usize,
    pub total_students: usize,
    pub active_classes: usize,
    pub total_enrollments: usize,
    /// `(professor_id, department)` for every professor.
    pub departments: &'a [(String, String)],
    pub classes: &'a [ClassRef],
    pub students: &'a [StudentRef],
    pub enrollment_dates: &'a [NaiveDate],
    pub facts: &'a [AttendanceFact],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewTotals {
    pub active_professors: usize,
    pub total_students: usize,
    pub active_classes: usize,
    pub total_enrollments: usize,
    #[serde(flatten)]
    pub rates: RateSummary,
    pub window: Window,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCount {
    pub month: String,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRate {
    pub department: String,
    pub total_classes: usize,
    pub total_students: i64,
    pub presence_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowPresenceClass {
    pub class_id: String,
    pub class_name: String,
    pub professor_name: String,
    pub student_count: i64,
    pub presence_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighAbsenceStudent {
    pub student_id: String,
    pub name: String,
    pub registration: String,
    pub course: String,
    pub total: usize,
    pub absences: usize,
    pub absence_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alerts {
    pub low_presence_classes: Vec<LowPresenceClass>,
    pub high_absence_students: Vec<HighAbsenceStudent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub totals: OverviewTotals,
    pub enrollment_growth: Vec<MonthlyCount>,
    pub departments: Vec<DepartmentRate>,
    pub alerts: Alerts,
    pub recommendations: Vec<Recommendation>,
}

/// Active classes with at least one record and presence below
/// [`LOW_CLASS_PRESENCE`], lowest first.
pub fn low_presence_classes<'a>(
    classes: &'a [ClassRef],
    by_class: &HashMap<String, StatusTally>,
) -> Vec<(&'a ClassRef, StatusTally)> {
    let mut out: Vec<(&ClassRef, StatusTally)> = classes
        .iter()
        .filter(|c| c.status == ClassStatus::Active)
        .filter_map(|c| by_class.get(&c.class_id).map(|t| (c, *t)))
        .filter(|(_, t)| t.total() > 0 && t.presence_rate() < LOW_CLASS_PRESENCE)
        .collect();
    out.sort_by(|a, b| {
        a.1.presence_rate()
            .partial_cmp(&b.1.presence_rate())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

/// Students whose absence rate exceeds [`HIGH_ABSENCE`], highest first.
pub fn high_absence_students<'a>(
    students: &'a [StudentRef],
    by_student: &HashMap<String, StatusTally>,
) -> Vec<(&'a StudentRef, StatusTally)> {
    let mut out: Vec<(&StudentRef, StatusTally)> = students
        .iter()
        .filter_map(|s| by_student.get(&s.student_id).map(|t| (s, *t)))
        .filter(|(_, t)| t.total() > 0 && t.absence_rate() > HIGH_ABSENCE)
        .collect();
    calc::rank_by_absence(&mut out);
    out
}

pub fn admin_recommendations(
    overall: &StatusTally,
    low_classes: usize,
    high_absence: usize,
) -> Vec<Recommendation> {
    let rate = overall.presence_rate();
    let mut out = Vec::new();
    if rate < SYSTEM_MIN_PRESENCE {
        out.push(Recommendation::new(
            Priority::High,
            "Low overall attendance",
            format!(
                "Overall presence is {:.1}%, below the recommended {:.0}%.",
                rate, SYSTEM_MIN_PRESENCE
            ),
            "Run an attendance awareness campaign.".to_string(),
        ));
    }
    if low_classes > 0 {
        out.push(Recommendation::new(
            Priority::High,
            "Classes with low attendance",
            format!(
                "{} class(es) have a presence rate below {:.0}%.",
                low_classes, LOW_CLASS_PRESENCE
            ),
            "Meet the professors of these classes to find the cause.".to_string(),
        ));
    }
    if high_absence > 0 {
        out.push(Recommendation::new(
            Priority::Medium,
            "Students missing many lessons",
            format!(
                "{} student(s) have missed more than {:.0}% of their lessons.",
                high_absence, HIGH_ABSENCE
            ),
            "Contact these students and their course coordinators.".to_string(),
        ));
    }
    if rate > EXCELLENT_PRESENCE && low_classes == 0 {
        out.push(Recommendation::new(
            Priority::Low,
            "Excellent attendance",
            "Attendance is excellent across the system.".to_string(),
            "Keep the current policies and recognise the best performing professors."
                .to_string(),
        ));
    }
    out
}

fn department_rates(
    departments: &[(String, String)],
    classes: &[ClassRef],
    facts: &[AttendanceFact],
) -> Vec<DepartmentRate> {
    let dept_of: HashMap<&str, &str> = departments
        .iter()
        .map(|(pid, dept)| (pid.as_str(), dept.as_str()))
        .collect();
    let mut out: BTreeMap<&str, (usize, i64, StatusTally)> = BTreeMap::new();
    for (_, dept) in departments {
        out.entry(dept.as_str()).or_default();
    }
    for c in classes {
        if let Some(&dept) = dept_of.get(c.professor_id.as_str()) {
            let slot = out.entry(dept).or_default();
            slot.0 += 1;
            slot.1 += c.student_count;
        }
    }
    for f in facts {
        if let Some(&dept) = dept_of.get(f.professor_id.as_str()) {
            out.entry(dept).or_default().2.add(f.status);
        }
    }
    out.into_iter()
        .map(|(dept, (total_classes, total_students, tally))| DepartmentRate {
            department: dept.to_string(),
            total_classes,
            total_students,
            presence_rate: calc::round_2_decimals(tally.presence_rate()),
        })
        .collect()
}

pub fn compose_overview(input: &OverviewInput<'_>) -> Overview {
    let overall = calc::tally(input.facts);
    let by_class = calc::tally_by(input.facts, |f| f.class_id.as_str());
    let by_student = calc::tally_by(input.facts, |f| f.student_id.as_str());
    let low = low_presence_classes(input.classes, &by_class);
    let absent = high_absence_students(input.students, &by_student);
    let recommendations = admin_recommendations(&overall, low.len(), absent.len());

    let growth = Window::trailing(input.today, GROWTH_WINDOW_DAYS);
    let recent_enrollments = input
        .enrollment_dates
        .iter()
        .copied()
        .filter(|d| growth.from <= *d && *d <= growth.to);

    Overview {
        totals: OverviewTotals {
            active_professors: input.active_professors,
            total_students: input.total_students,
            active_classes: input.active_classes,
            total_enrollments: input.total_enrollments,
            rates: overall.summary(),
            window: Window::trailing(input.today, OVERVIEW_WINDOW_DAYS),
        },
        enrollment_growth: calc::count_by_month(recent_enrollments)
            .into_iter()
            .map(|(key, total)| MonthlyCount {
                month: calc::month_label(key),
                total,
            })
            .collect(),
        departments: department_rates(input.departments, input.classes, input.facts),
        alerts: Alerts {
            low_presence_classes: low
                .iter()
                .take(LOW_CLASS_ALERTS)
                .map(|(c, t)| LowPresenceClass {
                    class_id: c.class_id.clone(),
                    class_name: c.name.clone(),
                    professor_name: c.professor_name.clone(),
                    student_count: c.student_count,
                    presence_rate: calc::round_2_decimals(t.presence_rate()),
                })
                .collect(),
            high_absence_students: absent
                .iter()
                .take(HIGH_ABSENCE_ALERTS)
                .map(|(s, t)| HighAbsenceStudent {
                    student_id: s.student_id.clone(),
                    name: s.name.clone(),
                    registration: s.registration.clone(),
                    course: s.course.clone(),
                    total: t.total(),
                    absences: t.absent,
                    absence_rate: calc::round_2_decimals(t.absence_rate()),
                })
                .collect(),
        },
        recommendations,
    }
}

// ---------------------------------------------------------------------------
// Presence report

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub class_id: Option<String>,
    pub format: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportClassRow {
    pub class_id: String,
    pub class_name: String,
    pub professor_name: String,
    #[serde(flatten)]
    pub rates: RateSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceReport {
    pub title: String,
    pub window: Window,
    pub params: ReportParams,
    pub totals: RateSummary,
    pub by_class: Vec<ReportClassRow>,
    pub generated_at: String,
    pub generated_by: String,
}

/// `facts` must already be restricted to `window` (and the class, if any).
/// Only classes with records in the window get a row, ordered by name.
pub fn compose_report(
    window: Window,
    params: ReportParams,
    focus_class: Option<&str>,
    classes: &[ClassRef],
    facts: &[AttendanceFact],
    generated_at: String,
    generated_by: String,
) -> PresenceReport {
    let by_class = calc::tally_by(facts, |f| f.class_id.as_str());
    let mut rows: Vec<ReportClassRow> = classes
        .iter()
        .filter_map(|c| {
            by_class.get(&c.class_id).map(|t| ReportClassRow {
                class_id: c.class_id.clone(),
                class_name: c.name.clone(),
                professor_name: c.professor_name.clone(),
                rates: t.summary(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.class_name.cmp(&b.class_name).then(a.class_id.cmp(&b.class_id)));

    PresenceReport {
        title: match focus_class {
            Some(name) => format!("Attendance report - {}", name),
            None => "General attendance report".to_string(),
        },
        window,
        params,
        totals: calc::tally(facts).summary(),
        by_class: rows,
        generated_at,
        generated_by,
    }
}

// ---------------------------------------------------------------------------
// Public statistics

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BestClass {
    pub class_id: String,
    pub name: String,
    pub presence_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStats {
    pub active_professors: usize,
    pub total_students: usize,
    pub active_classes: usize,
    pub presence_rate: f64,
    pub best_class: Option<BestClass>,
}

/// Best class is the highest raw presence rate among classes with records;
/// ties keep the order of `classes`.
pub fn compose_public_stats(
    active_professors: usize,
    total_students: usize,
    active_classes: usize,
    classes: &[ClassRef],
    facts: &[AttendanceFact],
) -> PublicStats {
    let by_class = calc::tally_by(facts, |f| f.class_id.as_str());
    let mut ranked: Vec<(&ClassRef, StatusTally)> = classes
        .iter()
        .filter_map(|c| by_class.get(&c.class_id).map(|t| (c, *t)))
        .collect();
    calc::rank_by_presence(&mut ranked);

    PublicStats {
        active_professors,
        total_students,
        active_classes,
        presence_rate: calc::round_2_decimals(calc::rate(
            facts.iter().map(|f| f.status),
            AttendanceStatus::Present,
        )),
        best_class: ranked.first().map(|(c, t)| BestClass {
            class_id: c.class_id.clone(),
            name: c.name.clone(),
            presence_rate: calc::round_2_decimals(t.presence_rate()),
        }),
    }
}
