#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// A running `rollcalld` speaking NDJSON over its stdio.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_rollcalld");
        let mut child = Command::new(exe)
            .env_remove("ROLLCALL_WORKSPACE")
            .env("ROLLCALL_LOG", "off")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn rollcalld");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Spawns a sidecar with a fresh temp workspace already selected.
    pub fn with_workspace(prefix: &str) -> Self {
        let mut sidecar = Self::spawn();
        let workspace = temp_dir(prefix);
        sidecar.ok(
            None,
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        sidecar
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn call(&mut self, actor: Option<&str>, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let mut payload = json!({ "id": id, "method": method, "params": params });
        if let Some(actor) = actor {
            payload["actorId"] = json!(actor);
        }
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, actor: Option<&str>, method: &str, params: Value) -> Value {
        let value = self.call(actor, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Error code of a call expected to fail.
    pub fn err_code(&mut self, actor: Option<&str>, method: &str, params: Value) -> String {
        let value = self.call(actor, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .expect("error code")
            .to_string()
    }
}

pub fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing string at {} in {}", pointer, value))
}

pub fn f64_at(value: &Value, pointer: &str) -> f64 {
    value
        .pointer(pointer)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("missing number at {} in {}", pointer, value))
}

pub fn len_at(value: &Value, pointer: &str) -> usize {
    value
        .pointer(pointer)
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or_else(|| panic!("missing array at {} in {}", pointer, value))
}

/// Creates the bootstrap admin and returns its user id.
pub fn bootstrap_admin(sc: &mut Sidecar) -> String {
    let account = sc.ok(
        None,
        "auth.createAdmin",
        json!({ "username": "admin", "email": "admin@school.test", "password": "admin-pass-1" }),
    );
    str_at(&account, "/user/id").to_string()
}

/// Registers a user account and returns its id.
pub fn register(sc: &mut Sidecar, username: &str) -> String {
    let account = sc.ok(
        None,
        "auth.register",
        json!({
            "username": username,
            "email": format!("{}@school.test", username),
            "password": "secret-pass",
            "passwordConfirm": "secret-pass",
            "firstName": username,
            "lastName": "Test",
        }),
    );
    str_at(&account, "/user/id").to_string()
}

/// Professor linked to a fresh account. Returns `(user_id, professor_id)`.
pub fn professor(sc: &mut Sidecar, admin: &str, name: &str) -> (String, String) {
    let user = register(sc, &format!("prof-{}", name.to_lowercase()));
    let created = sc.ok(
        Some(admin),
        "professors.create",
        json!({
            "name": name,
            "email": format!("{}@staff.test", name.to_lowercase()),
            "department": "Science",
            "userId": user,
        }),
    );
    let id = str_at(&created, "/professor/id").to_string();
    (user, id)
}

/// Student linked to a fresh account. Returns `(user_id, student_id)`.
pub fn student(sc: &mut Sidecar, admin: &str, name: &str, registration: &str) -> (String, String) {
    let user = register(sc, &format!("stud-{}", name.to_lowercase()));
    let created = sc.ok(
        Some(admin),
        "students.create",
        json!({
            "name": name,
            "registration": registration,
            "email": format!("{}@students.test", name.to_lowercase()),
            "course": "Physics",
            "birthDate": "2004-05-20",
            "gender": "F",
            "userId": user,
        }),
    );
    let id = str_at(&created, "/student/id").to_string();
    (user, id)
}

pub fn class(sc: &mut Sidecar, admin: &str, name: &str, professor_id: &str) -> String {
    let created = sc.ok(
        Some(admin),
        "classes.create",
        json!({
            "name": name,
            "professorId": professor_id,
            "startDate": "2025-02-01",
            "endDate": "2025-12-15",
        }),
    );
    str_at(&created, "/class/id").to_string()
}

pub fn enroll(sc: &mut Sidecar, admin: &str, class_id: &str, student_id: &str) -> String {
    let created = sc.ok(
        Some(admin),
        "enrollments.create",
        json!({ "classId": class_id, "studentId": student_id }),
    );
    str_at(&created, "/enrollment/id").to_string()
}
