mod test_support;

use serde_json::{json, Value};
use test_support::{
    bootstrap_admin, class, enroll, len_at, professor, str_at, student, Sidecar,
};

struct Fixture {
    sc: Sidecar,
    admin: String,
    owner_user: String,
    class_id: String,
    students: Vec<String>,
    enrollments: Vec<String>,
}

fn fixture(prefix: &str) -> Fixture {
    let mut sc = Sidecar::with_workspace(prefix);
    let admin = bootstrap_admin(&mut sc);
    let (owner_user, owner) = professor(&mut sc, &admin, "Beatriz");
    let class_id = class(&mut sc, &admin, "Kinematics", &owner);
    let mut students = Vec::new();
    let mut enrollments = Vec::new();
    for (name, reg) in [("Caio", "R-1"), ("Dora", "R-2")] {
        let (_, sid) = student(&mut sc, &admin, name, reg);
        enrollments.push(enroll(&mut sc, &admin, &class_id, &sid));
        students.push(sid);
    }
    Fixture {
        sc,
        admin,
        owner_user,
        class_id,
        students,
        enrollments,
    }
}

fn presence_count(sc: &mut Sidecar, actor: &str, enrollment_id: &str) -> i64 {
    let row = sc.ok(
        Some(actor),
        "enrollments.get",
        json!({ "enrollmentId": enrollment_id }),
    );
    row.pointer("/enrollment/presenceCount")
        .and_then(|v| v.as_i64())
        .expect("presenceCount")
}

fn results(resp: &Value) -> &Vec<Value> {
    resp.get("results")
        .and_then(|v| v.as_array())
        .expect("results")
}

#[test]
fn bulk_mark_is_idempotent() {
    let mut fx = fixture("rollcall-mark-idempotent");
    let params = json!({
        "classId": fx.class_id,
        "date": "2025-03-10",
        "entries": [
            { "studentId": fx.students[0] },
            { "studentId": fx.students[1], "status": "absent", "note": "flu" },
        ],
    });

    let first = fx.sc.ok(Some(&fx.owner_user), "attendance.mark", params.clone());
    assert_eq!(first.get("succeeded").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(str_at(&first, "/date"), "2025-03-10");
    assert!(results(&first)
        .iter()
        .all(|r| r.get("created").and_then(|v| v.as_bool()) == Some(true)));

    let second = fx.sc.ok(Some(&fx.owner_user), "attendance.mark", params);
    assert!(results(&second)
        .iter()
        .all(|r| r.get("created").and_then(|v| v.as_bool()) == Some(false)));
    assert_eq!(
        results(&first)
            .iter()
            .map(|r| r.get("recordId").cloned())
            .collect::<Vec<_>>(),
        results(&second)
            .iter()
            .map(|r| r.get("recordId").cloned())
            .collect::<Vec<_>>()
    );

    let listed = fx.sc.ok(
        Some(&fx.owner_user),
        "attendance.list",
        json!({ "classId": fx.class_id, "date": "2025-03-10" }),
    );
    assert_eq!(len_at(&listed, "/records"), 2);
    let absent = fx.sc.ok(
        Some(&fx.owner_user),
        "attendance.list",
        json!({ "classId": fx.class_id, "status": "absent" }),
    );
    assert_eq!(str_at(&absent, "/records/0/note"), "flu");

    let (owner, enrollment) = (fx.owner_user.clone(), fx.enrollments[0].clone());
    assert_eq!(presence_count(&mut fx.sc, &owner, &enrollment), 1);
}

#[test]
fn non_enrolled_entry_fails_alone() {
    let mut fx = fixture("rollcall-mark-partial");
    let (_, outsider) = student(&mut fx.sc, &fx.admin.clone(), "Elis", "R-9");
    let resp = fx.sc.ok(
        Some(&fx.owner_user),
        "attendance.mark",
        json!({
            "classId": fx.class_id,
            "date": "2025-03-11",
            "entries": [
                { "studentId": fx.students[0], "status": "present" },
                { "studentId": outsider, "status": "present" },
                { "studentId": fx.students[1], "status": "justified" },
            ],
        }),
    );
    assert_eq!(resp.get("succeeded").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(resp.get("failed").and_then(|v| v.as_u64()), Some(1));
    let rows = results(&resp);
    assert_eq!(rows[1].get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(str_at(&rows[1], "/error/code"), "not_found");
    assert!(rows[1].get("recordId").is_none());
}

#[test]
fn malformed_entries_reject_the_call() {
    let mut fx = fixture("rollcall-mark-malformed");
    let bad_status = fx.sc.call(
        Some(&fx.owner_user),
        "attendance.mark",
        json!({
            "classId": fx.class_id,
            "entries": [{ "studentId": fx.students[0], "status": "late" }],
        }),
    );
    assert_eq!(str_at(&bad_status, "/error/code"), "bad_params");
    assert_eq!(str_at(&bad_status, "/error/details/field"), "entries[0].status");

    let empty = fx.sc.err_code(
        Some(&fx.owner_user),
        "attendance.mark",
        json!({ "classId": fx.class_id, "entries": [] }),
    );
    assert_eq!(empty, "bad_params");

    let listed = fx.sc.ok(
        Some(&fx.owner_user),
        "attendance.list",
        json!({ "classId": fx.class_id }),
    );
    assert_eq!(len_at(&listed, "/records"), 0);
}

#[test]
fn only_owner_or_admin_may_mark() {
    let mut fx = fixture("rollcall-mark-owner");
    let admin = fx.admin.clone();
    let (stranger, _) = professor(&mut fx.sc, &admin, "Fausto");
    let params = json!({
        "classId": fx.class_id,
        "date": "2025-03-12",
        "entries": [{ "studentId": fx.students[0] }],
    });
    assert_eq!(
        fx.sc.err_code(Some(&stranger), "attendance.mark", params.clone()),
        "permission_denied"
    );
    assert_eq!(
        fx.sc.err_code(None, "attendance.mark", params.clone()),
        "permission_denied"
    );
    fx.sc.ok(Some(&admin), "attendance.mark", params);
    assert_eq!(
        fx.sc.err_code(
            Some(&admin),
            "attendance.mark",
            json!({ "classId": "missing", "entries": [{ "studentId": fx.students[0] }] })
        ),
        "not_found"
    );
}

#[test]
fn single_record_writes_keep_counter_fresh() {
    let mut fx = fixture("rollcall-mark-counter");
    let owner = fx.owner_user.clone();
    let enrollment = fx.enrollments[0].clone();

    let created = fx.sc.ok(
        Some(&owner),
        "attendance.create",
        json!({ "enrollmentId": enrollment, "date": "2025-04-01", "status": "present" }),
    );
    let record_id = str_at(&created, "/record/id").to_string();
    assert_eq!(presence_count(&mut fx.sc, &owner, &enrollment), 1);

    assert_eq!(
        fx.sc.err_code(
            Some(&owner),
            "attendance.create",
            json!({ "enrollmentId": enrollment, "date": "2025-04-01" })
        ),
        "conflict"
    );

    let updated = fx.sc.ok(
        Some(&owner),
        "attendance.update",
        json!({ "recordId": record_id, "status": "justified", "note": "doctor" }),
    );
    assert_eq!(str_at(&updated, "/record/status"), "justified");
    assert_eq!(presence_count(&mut fx.sc, &owner, &enrollment), 0);

    let defaulted = fx.sc.ok(
        Some(&owner),
        "attendance.create",
        json!({ "enrollmentId": enrollment, "date": "2025-04-02" }),
    );
    assert_eq!(str_at(&defaulted, "/record/status"), "absent");

    fx.sc.ok(Some(&owner), "attendance.delete", json!({ "recordId": record_id }));
    assert_eq!(
        fx.sc.err_code(Some(&owner), "attendance.get", json!({ "recordId": record_id })),
        "not_found"
    );

    // Dropping the enrollment takes its records with it.
    let admin = fx.admin.clone();
    fx.sc.ok(Some(&admin), "enrollments.delete", json!({ "enrollmentId": enrollment }));
    let left = fx.sc.ok(Some(&owner), "attendance.list", json!({ "enrollmentId": enrollment }));
    assert_eq!(len_at(&left, "/records"), 0);
}
