use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{dispatch, optional_str, required_str, Op};
use crate::ipc::types::{AppState, Request};
use crate::model::User;
use crate::permissions::{authorize, Action, Actor, Resource};
use crate::store::users::{self, NewUser, ProfilePatch};
use crate::validate;

fn name_part(params: &Value, key: &str) -> ServiceResult<String> {
    match optional_str(params, key)? {
        Some(raw) if !raw.trim().is_empty() => validate::text(key, &raw, validate::USERNAME_MAX),
        _ => Ok(String::new()),
    }
}

fn account_json(conn: &Connection, user: User) -> ServiceResult<Value> {
    let (professor_id, student_id) = users::linked_profiles(conn, &user.id)?;
    let role = if user.is_admin {
        "admin"
    } else if professor_id.is_some() {
        "professor"
    } else if student_id.is_some() {
        "student"
    } else {
        "user"
    };
    Ok(json!({
        "user": user,
        "role": role,
        "professorId": professor_id,
        "studentId": student_id,
    }))
}

fn own_user_id(actor: &Actor) -> ServiceResult<&str> {
    actor
        .user_id()
        .ok_or_else(|| ServiceError::denied("sign in first"))
}

fn new_user(params: &Value, confirm_key: Option<&str>, is_admin: bool) -> ServiceResult<NewUser> {
    let password = required_str(params, "password")?;
    let confirm = match confirm_key {
        Some(k) => required_str(params, k)?,
        None => password.clone(),
    };
    validate::new_password("password", &password, &confirm)?;
    Ok(NewUser {
        username: validate::text(
            "username",
            &required_str(params, "username")?,
            validate::USERNAME_MAX,
        )?,
        email: validate::email("email", &required_str(params, "email")?)?,
        first_name: name_part(params, "firstName")?,
        last_name: name_part(params, "lastName")?,
        password,
        is_admin,
    })
}

fn register(conn: &Connection, _actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let new = new_user(params, Some("passwordConfirm"), false)?;
    let user = users::create(conn, &new)?;
    account_json(conn, user)
}

fn login(conn: &Connection, _actor: &Actor, params: &Value) -> ServiceResult<Value> {
    let username = required_str(params, "username")?;
    let password = required_str(params, "password")?;
    let user = users::login(conn, username.trim(), &password)?;
    tracing::info!(user_id = %user.id, "login");
    account_json(conn, user)
}

fn profile(conn: &Connection, actor: &Actor, _params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Read, Resource::OwnAccount)?;
    let user = users::get(conn, own_user_id(actor)?)?;
    account_json(conn, user)
}

fn update_profile(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Update, Resource::OwnAccount)?;
    let patch = ProfilePatch {
        email: optional_str(params, "email")?
            .map(|e| validate::email("email", &e))
            .transpose()?,
        first_name: optional_str(params, "firstName")?
            .map(|_| name_part(params, "firstName"))
            .transpose()?,
        last_name: optional_str(params, "lastName")?
            .map(|_| name_part(params, "lastName"))
            .transpose()?,
    };
    let user = users::update_profile(conn, own_user_id(actor)?, &patch)?;
    account_json(conn, user)
}

fn change_password(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    authorize(actor, Action::Update, Resource::OwnAccount)?;
    let old = required_str(params, "oldPassword")?;
    let new = required_str(params, "newPassword")?;
    let confirm = required_str(params, "confirmPassword")?;
    validate::new_password("newPassword", &new, &confirm)?;
    users::change_password(conn, own_user_id(actor)?, &old, &new)?;
    Ok(json!({ "changed": true }))
}

/// Admins may add admins at any time; anyone may create the first one.
fn create_admin(conn: &Connection, actor: &Actor, params: &Value) -> ServiceResult<Value> {
    if users::admin_exists(conn)? && !actor.is_admin() {
        return Err(ServiceError::denied("only an admin may create another admin"));
    }
    let new = new_user(params, None, true)?;
    let user = users::create(conn, &new)?;
    account_json(conn, user)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let op: Op = match req.method.as_str() {
        "auth.register" => register,
        "auth.login" => login,
        "auth.profile" => profile,
        "auth.updateProfile" => update_profile,
        "auth.changePassword" => change_password,
        "auth.createAdmin" => create_admin,
        _ => return None,
    };
    Some(dispatch(state, req, op))
}
