use chrono::{Datelike, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Justified,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 3] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Justified,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Justified => "justified",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Active,
    Completed,
    Cancelled,
}

impl ClassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassStatus::Active => "active",
            ClassStatus::Completed => "completed",
            ClassStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(ClassStatus::Active),
            "completed" => Some(ClassStatus::Completed),
            "cancelled" => Some(ClassStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
    #[serde(rename = "N")]
    Undisclosed,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
            Gender::Undisclosed => "N",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            "O" => Some(Gender::Other),
            "N" => Some(Gender::Undisclosed),
            _ => None,
        }
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s).ok_or_else(|| {
                    FromSqlError::Other(format!("unknown {} value: {}", stringify!($ty), s).into())
                })
            }
        }
    };
}

sql_text_enum!(AttendanceStatus);
sql_text_enum!(ClassStatus);
sql_text_enum!(Gender);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Professor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub active: bool,
    pub created_at: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub registration: String,
    pub email: String,
    pub course: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub created_at: String,
    pub user_id: Option<String>,
}

impl Student {
    /// Whole years lived as of `today`.
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        let born = self.birth_date;
        let mut age = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            age -= 1;
        }
        age
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub description: String,
    pub professor_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ClassStatus,
    pub representative_id: Option<String>,
    pub created_at: String,
}

impl Class {
    pub fn is_running_on(&self, today: NaiveDate) -> bool {
        self.status == ClassStatus::Active && self.start_date <= today && today <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub class_id: String,
    pub student_id: String,
    pub enrolled_at: String,
    /// Denormalized count of Present records; rates never read it.
    pub presence_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub enrollment_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub note: String,
    pub recorded_at: String,
}

/// One attendance record flattened with the ids the aggregator groups by.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceFact {
    pub enrollment_id: String,
    pub class_id: String,
    pub student_id: String,
    pub professor_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}
