//! Role-based access decisions.
//!
//! Every request carries an [`Actor`]. Handlers load the target object from
//! the store first and pass the owner ids they found into [`Resource`], so an
//! ownership decision never rests on ids supplied by the caller.

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    None,
    Professor(String),
    Student(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Authenticated { user_id: String, profile: Profile },
    Admin { user_id: String },
}

impl Actor {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Actor::Anonymous => None,
            Actor::Authenticated { user_id, .. } | Actor::Admin { user_id } => Some(user_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    pub fn professor_id(&self) -> Option<&str> {
        match self {
            Actor::Authenticated {
                profile: Profile::Professor(id),
                ..
            } => Some(id),
            _ => None,
        }
    }

    pub fn student_id(&self) -> Option<&str> {
        match self {
            Actor::Authenticated {
                profile: Profile::Student(id),
                ..
            } => Some(id),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Actor::Anonymous => "anonymous",
            Actor::Authenticated {
                profile: Profile::None,
                ..
            } => "user",
            Actor::Authenticated {
                profile: Profile::Professor(_),
                ..
            } => "professor",
            Actor::Authenticated {
                profile: Profile::Student(_),
                ..
            } => "student",
            Actor::Admin { .. } => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource<'a> {
    ProfessorDirectory,
    StudentDirectory,
    /// `owner` is the owning professor id, `None` for the class list.
    Class { owner: Option<&'a str> },
    /// Enrolled students and representative of a class.
    ClassRoster,
    Enrollment,
    /// `class_owner` is the professor owning the record's class.
    AttendanceRecord { class_owner: Option<&'a str> },
    ProfessorDashboard { professor_id: &'a str },
    StudentDashboard { student_id: &'a str },
    StudentAttendance { student_id: &'a str },
    SystemAnalytics,
    OwnAccount,
    PublicStatistics,
}

impl Resource<'_> {
    fn as_str(&self) -> &'static str {
        match self {
            Resource::ProfessorDirectory => "professor_directory",
            Resource::StudentDirectory => "student_directory",
            Resource::Class { .. } => "class",
            Resource::ClassRoster => "class_roster",
            Resource::Enrollment => "enrollment",
            Resource::AttendanceRecord { .. } => "attendance_record",
            Resource::ProfessorDashboard { .. } => "professor_dashboard",
            Resource::StudentDashboard { .. } => "student_dashboard",
            Resource::StudentAttendance { .. } => "student_attendance",
            Resource::SystemAnalytics => "system_analytics",
            Resource::OwnAccount => "own_account",
            Resource::PublicStatistics => "public_statistics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

fn owns(actor: &Actor, owner: Option<&str>) -> bool {
    match (actor.professor_id(), owner) {
        (Some(me), Some(owner)) => me == owner,
        _ => false,
    }
}

pub fn decide(actor: &Actor, action: Action, resource: Resource<'_>) -> Decision {
    if actor.is_admin() {
        return Decision::Allow;
    }
    let authenticated = !matches!(actor, Actor::Anonymous);

    let allowed = match (resource, action) {
        (Resource::PublicStatistics, Action::Read) => true,
        (Resource::PublicStatistics, _) => false,

        (Resource::ProfessorDirectory | Resource::StudentDirectory, Action::Read) => true,
        (Resource::ProfessorDirectory | Resource::StudentDirectory, _) => false,

        (Resource::Class { .. }, Action::Read) => true,
        (Resource::Class { .. }, Action::Create) => false,
        (Resource::Class { owner }, Action::Update | Action::Delete) => owns(actor, owner),

        (Resource::ClassRoster, Action::Read) => authenticated,
        (Resource::ClassRoster, _) => false,

        (Resource::Enrollment, Action::Read) => authenticated,
        (Resource::Enrollment, _) => false,

        (Resource::AttendanceRecord { .. }, Action::Read) => authenticated,
        (Resource::AttendanceRecord { class_owner }, _) => owns(actor, class_owner),

        (Resource::ProfessorDashboard { professor_id }, Action::Read) => {
            actor.professor_id() == Some(professor_id)
        }
        (Resource::StudentDashboard { student_id }, Action::Read)
        | (Resource::StudentAttendance { student_id }, Action::Read) => {
            actor.student_id() == Some(student_id)
        }
        (
            Resource::ProfessorDashboard { .. }
            | Resource::StudentDashboard { .. }
            | Resource::StudentAttendance { .. },
            _,
        ) => false,

        (Resource::SystemAnalytics, _) => false,

        (Resource::OwnAccount, _) => authenticated,
    };
    Decision::from(allowed)
}

/// `decide`, turned into a request-level error on deny.
pub fn authorize(actor: &Actor, action: Action, resource: Resource<'_>) -> ServiceResult<()> {
    if decide(actor, action, resource).is_allowed() {
        return Ok(());
    }
    tracing::info!(
        actor = actor.kind(),
        user_id = actor.user_id().unwrap_or("-"),
        action = action.as_str(),
        resource = resource.as_str(),
        "permission denied"
    );
    Err(ServiceError::denied(format!(
        "{} may not {} {}",
        actor.kind(),
        action.as_str(),
        resource.as_str().replace('_', " ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Actor {
        Actor::Admin {
            user_id: "u-admin".into(),
        }
    }

    fn professor(id: &str) -> Actor {
        Actor::Authenticated {
            user_id: format!("u-{}", id),
            profile: Profile::Professor(id.into()),
        }
    }

    fn student(id: &str) -> Actor {
        Actor::Authenticated {
            user_id: format!("u-{}", id),
            profile: Profile::Student(id.into()),
        }
    }

    fn bare_user() -> Actor {
        Actor::Authenticated {
            user_id: "u-bare".into(),
            profile: Profile::None,
        }
    }

    const WRITES: [Action; 3] = [Action::Create, Action::Update, Action::Delete];

    #[test]
    fn directories_are_public_read_admin_write() {
        for resource in [Resource::ProfessorDirectory, Resource::StudentDirectory] {
            for actor in [Actor::Anonymous, bare_user(), professor("p1"), student("s1")] {
                assert!(decide(&actor, Action::Read, resource).is_allowed());
                for w in WRITES {
                    assert_eq!(decide(&actor, w, resource), Decision::Deny);
                }
            }
            for w in WRITES {
                assert!(decide(&admin(), w, resource).is_allowed());
            }
        }
    }

    #[test]
    fn class_create_is_admin_only_update_needs_owner() {
        let owned = Resource::Class { owner: Some("p1") };
        let list = Resource::Class { owner: None };
        assert!(decide(&Actor::Anonymous, Action::Read, owned).is_allowed());
        assert!(!decide(&professor("p1"), Action::Create, list).is_allowed());
        assert!(decide(&admin(), Action::Create, list).is_allowed());
        assert!(decide(&professor("p1"), Action::Update, owned).is_allowed());
        assert!(decide(&professor("p1"), Action::Delete, owned).is_allowed());
        assert!(!decide(&professor("p2"), Action::Update, owned).is_allowed());
        assert!(!decide(&student("s1"), Action::Update, owned).is_allowed());
        assert!(!decide(&professor("p1"), Action::Update, list).is_allowed());
    }

    #[test]
    fn enrollment_reads_need_authentication_writes_need_admin() {
        assert!(!decide(&Actor::Anonymous, Action::Read, Resource::Enrollment).is_allowed());
        assert!(decide(&bare_user(), Action::Read, Resource::Enrollment).is_allowed());
        assert!(!decide(&professor("p1"), Action::Create, Resource::Enrollment).is_allowed());
        assert!(decide(&admin(), Action::Delete, Resource::Enrollment).is_allowed());
    }

    #[test]
    fn attendance_writes_follow_class_ownership() {
        let rec = Resource::AttendanceRecord {
            class_owner: Some("p1"),
        };
        assert!(decide(&student("s1"), Action::Read, rec).is_allowed());
        assert!(!decide(&Actor::Anonymous, Action::Read, rec).is_allowed());
        assert!(decide(&professor("p1"), Action::Create, rec).is_allowed());
        assert!(decide(&professor("p1"), Action::Delete, rec).is_allowed());
        assert!(!decide(&professor("p2"), Action::Update, rec).is_allowed());
        assert!(!decide(&student("s1"), Action::Create, rec).is_allowed());
        assert!(decide(&admin(), Action::Update, rec).is_allowed());
    }

    #[test]
    fn dashboards_are_self_or_admin() {
        let pd = Resource::ProfessorDashboard { professor_id: "p1" };
        let sd = Resource::StudentDashboard { student_id: "s1" };
        assert!(decide(&professor("p1"), Action::Read, pd).is_allowed());
        assert!(!decide(&professor("p2"), Action::Read, pd).is_allowed());
        assert!(!decide(&student("p1"), Action::Read, pd).is_allowed());
        assert!(decide(&student("s1"), Action::Read, sd).is_allowed());
        assert!(!decide(&student("s2"), Action::Read, sd).is_allowed());
        assert!(decide(&admin(), Action::Read, sd).is_allowed());
        assert!(decide(&admin(), Action::Read, pd).is_allowed());
    }

    #[test]
    fn profileless_user_is_denied_writes_and_dashboards() {
        let u = bare_user();
        assert!(!decide(&u, Action::Read, Resource::ProfessorDashboard { professor_id: "p1" }).is_allowed());
        assert!(!decide(&u, Action::Read, Resource::StudentDashboard { student_id: "s1" }).is_allowed());
        assert!(!decide(&u, Action::Update, Resource::Class { owner: Some("p1") }).is_allowed());
        assert!(!decide(&u, Action::Create, Resource::AttendanceRecord { class_owner: Some("p1") }).is_allowed());
        assert!(decide(&u, Action::Read, Resource::OwnAccount).is_allowed());
    }

    #[test]
    fn system_analytics_is_admin_only() {
        assert!(!decide(&professor("p1"), Action::Read, Resource::SystemAnalytics).is_allowed());
        assert!(decide(&admin(), Action::Read, Resource::SystemAnalytics).is_allowed());
    }

    #[test]
    fn authorize_reports_permission_denied() {
        let e = authorize(
            &student("s1"),
            Action::Read,
            Resource::StudentDashboard { student_id: "s2" },
        )
        .expect_err("denied");
        assert!(matches!(e, ServiceError::PermissionDenied(_)));
    }
}
