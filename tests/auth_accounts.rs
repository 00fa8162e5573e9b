mod test_support;

use serde_json::json;
use test_support::{bootstrap_admin, professor, register, str_at, Sidecar};

#[test]
fn register_login_and_profile() {
    let mut sc = Sidecar::with_workspace("rollcall-auth-register");
    let user = register(&mut sc, "lia");

    let login = sc.ok(
        None,
        "auth.login",
        json!({ "username": "LIA", "password": "secret-pass" }),
    );
    assert_eq!(str_at(&login, "/user/id"), user);
    assert_eq!(str_at(&login, "/role"), "user");
    assert!(login.pointer("/user/lastLogin").map_or(false, |v| v.is_string()));
    assert!(login.pointer("/user/passwordHash").is_none());

    let profile = sc.ok(Some(&user), "auth.profile", json!({}));
    assert_eq!(str_at(&profile, "/user/username"), "lia");
    assert!(profile.get("professorId").map_or(false, |v| v.is_null()));

    let updated = sc.ok(
        Some(&user),
        "auth.updateProfile",
        json!({ "email": "Lia.New@School.test", "firstName": "Lia" }),
    );
    assert_eq!(str_at(&updated, "/user/email"), "lia.new@school.test");
    assert_eq!(str_at(&updated, "/user/firstName"), "Lia");

    assert_eq!(
        sc.err_code(None, "auth.profile", json!({})),
        "permission_denied"
    );
}

#[test]
fn registration_rules() {
    let mut sc = Sidecar::with_workspace("rollcall-auth-rules");
    register(&mut sc, "dup");
    let again = sc.err_code(
        None,
        "auth.register",
        json!({
            "username": "Dup",
            "email": "other@school.test",
            "password": "secret-pass",
            "passwordConfirm": "secret-pass",
        }),
    );
    assert_eq!(again, "conflict");

    let email_taken = sc.err_code(
        None,
        "auth.register",
        json!({
            "username": "fresh",
            "email": "dup@school.test",
            "password": "secret-pass",
            "passwordConfirm": "secret-pass",
        }),
    );
    assert_eq!(email_taken, "conflict");

    let resp = sc.call(
        None,
        "auth.register",
        json!({
            "username": "short",
            "email": "short@school.test",
            "password": "1234567",
            "passwordConfirm": "1234567",
        }),
    );
    assert_eq!(str_at(&resp, "/error/code"), "bad_params");
    assert_eq!(str_at(&resp, "/error/details/field"), "password");

    let mismatch = sc.err_code(
        None,
        "auth.register",
        json!({
            "username": "mismatch",
            "email": "mismatch@school.test",
            "password": "secret-pass",
            "passwordConfirm": "secret-pasS",
        }),
    );
    assert_eq!(mismatch, "bad_params");
}

#[test]
fn login_failures_look_alike() {
    let mut sc = Sidecar::with_workspace("rollcall-auth-login");
    register(&mut sc, "omar");
    let wrong_password = sc.call(
        None,
        "auth.login",
        json!({ "username": "omar", "password": "not-the-one" }),
    );
    let unknown_user = sc.call(
        None,
        "auth.login",
        json!({ "username": "nobody", "password": "not-the-one" }),
    );
    assert_eq!(str_at(&wrong_password, "/error/code"), "permission_denied");
    assert_eq!(
        wrong_password.pointer("/error/message"),
        unknown_user.pointer("/error/message")
    );
}

#[test]
fn change_password_flow() {
    let mut sc = Sidecar::with_workspace("rollcall-auth-password");
    let user = register(&mut sc, "rui");

    let resp = sc.call(
        Some(&user),
        "auth.changePassword",
        json!({ "oldPassword": "wrong-pass", "newPassword": "brand-new-1", "confirmPassword": "brand-new-1" }),
    );
    assert_eq!(str_at(&resp, "/error/details/field"), "oldPassword");

    let resp = sc.call(
        Some(&user),
        "auth.changePassword",
        json!({ "oldPassword": "secret-pass", "newPassword": "secret-pass", "confirmPassword": "secret-pass" }),
    );
    assert_eq!(str_at(&resp, "/error/details/field"), "newPassword");

    sc.ok(
        Some(&user),
        "auth.changePassword",
        json!({ "oldPassword": "secret-pass", "newPassword": "brand-new-1", "confirmPassword": "brand-new-1" }),
    );
    assert_eq!(
        sc.err_code(
            None,
            "auth.login",
            json!({ "username": "rui", "password": "secret-pass" })
        ),
        "permission_denied"
    );
    sc.ok(
        None,
        "auth.login",
        json!({ "username": "rui", "password": "brand-new-1" }),
    );
}

#[test]
fn admin_bootstrap_then_admin_only() {
    let mut sc = Sidecar::with_workspace("rollcall-auth-admin");
    let admin = bootstrap_admin(&mut sc);
    let user = register(&mut sc, "eve");

    let second = json!({ "username": "root2", "email": "root2@school.test", "password": "admin-pass-2" });
    assert_eq!(
        sc.err_code(None, "auth.createAdmin", second.clone()),
        "permission_denied"
    );
    assert_eq!(
        sc.err_code(Some(&user), "auth.createAdmin", second.clone()),
        "permission_denied"
    );
    let created = sc.ok(Some(&admin), "auth.createAdmin", second);
    assert_eq!(str_at(&created, "/role"), "admin");
}

#[test]
fn linked_professor_reports_role() {
    let mut sc = Sidecar::with_workspace("rollcall-auth-role");
    let admin = bootstrap_admin(&mut sc);
    let (user, professor_id) = professor(&mut sc, &admin, "Marta");
    let profile = sc.ok(Some(&user), "auth.profile", json!({}));
    assert_eq!(str_at(&profile, "/role"), "professor");
    assert_eq!(str_at(&profile, "/professorId"), professor_id);

    // One account cannot back two profiles.
    let clash = sc.err_code(
        Some(&admin),
        "students.create",
        json!({
            "name": "Marta",
            "registration": "R-1",
            "email": "marta@students.test",
            "course": "Physics",
            "birthDate": "2000-01-01",
            "gender": "F",
            "userId": user,
        }),
    );
    assert_eq!(clash, "conflict");
}
