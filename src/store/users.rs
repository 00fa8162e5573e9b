use rusqlite::{Connection, OptionalExtension, Row};

use super::{new_id, now_ts};
use crate::auth;
use crate::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::model::User;
use crate::permissions::{Actor, Profile};

const USER_COLS: &str =
    "id, username, email, first_name, last_name, is_admin, active, created_at, last_login";

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        username: r.get(1)?,
        email: r.get(2)?,
        first_name: r.get(3)?,
        last_name: r.get(4)?,
        is_admin: r.get::<_, i64>(5)? != 0,
        active: r.get::<_, i64>(6)? != 0,
        created_at: r.get(7)?,
        last_login: r.get(8)?,
    })
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub is_admin: bool,
}

pub fn create(conn: &Connection, new: &NewUser) -> ServiceResult<User> {
    if username_taken(conn, &new.username)? {
        return Err(ServiceError::Conflict("username already taken".into()));
    }
    if email_taken(conn, &new.email, None)? {
        return Err(ServiceError::Conflict("email already registered".into()));
    }

    let id = new_id();
    let salt = auth::new_salt();
    let digest = auth::password_digest(&salt, &new.password);
    conn.execute(
        "INSERT INTO users(id, username, email, first_name, last_name,
                           password_salt, password_hash, is_admin, active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        (
            &id,
            &new.username,
            &new.email,
            &new.first_name,
            &new.last_name,
            &salt,
            &digest,
            new.is_admin as i64,
            now_ts(),
        ),
    )
    .map_err(|e| conflict_on_unique(e, "username or email already registered"))?;
    tracing::info!(user_id = %id, admin = new.is_admin, "user registered");
    get(conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> ServiceResult<User> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLS);
    conn.query_row(&sql, [id], user_from_row)
        .optional()?
        .ok_or_else(|| ServiceError::not_found("user"))
}

fn username_taken(conn: &Connection, username: &str) -> ServiceResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM users WHERE username = ? COLLATE NOCASE",
            [username],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn email_taken(conn: &Connection, email: &str, except_id: Option<&str>) -> ServiceResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM users WHERE email = ? AND id <> COALESCE(?, '')",
            (email, except_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub fn admin_exists(conn: &Connection) -> ServiceResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM users WHERE is_admin = 1 LIMIT 1", [], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

/// Checks a username/password pair. Unknown user, wrong password and
/// inactive account are indistinguishable to the caller.
pub fn login(conn: &Connection, username: &str, password: &str) -> ServiceResult<User> {
    let row: Option<(String, String, String, bool)> = conn
        .query_row(
            "SELECT id, password_salt, password_hash, active
             FROM users WHERE username = ? COLLATE NOCASE",
            [username],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get::<_, i64>(3)? != 0)),
        )
        .optional()?;
    let denied = || ServiceError::denied("invalid username or password");
    let Some((id, salt, digest, active)) = row else {
        return Err(denied());
    };
    if !active || !auth::verify_password(&salt, &digest, password) {
        tracing::info!(user_id = %id, "login rejected");
        return Err(denied());
    }
    conn.execute(
        "UPDATE users SET last_login = ? WHERE id = ?",
        (now_ts(), &id),
    )?;
    get(conn, &id)
}

#[derive(Default)]
pub struct ProfilePatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub fn update_profile(conn: &Connection, id: &str, patch: &ProfilePatch) -> ServiceResult<User> {
    let current = get(conn, id)?;
    if let Some(email) = patch.email.as_deref() {
        if email_taken(conn, email, Some(id))? {
            return Err(ServiceError::Conflict("email already registered".into()));
        }
    }
    conn.execute(
        "UPDATE users SET email = ?, first_name = ?, last_name = ? WHERE id = ?",
        (
            patch.email.as_deref().unwrap_or(&current.email),
            patch.first_name.as_deref().unwrap_or(&current.first_name),
            patch.last_name.as_deref().unwrap_or(&current.last_name),
            id,
        ),
    )
    .map_err(|e| conflict_on_unique(e, "email already registered"))?;
    get(conn, id)
}

pub fn change_password(
    conn: &Connection,
    id: &str,
    old_password: &str,
    new_password: &str,
) -> ServiceResult<()> {
    let (salt, digest): (String, String) = conn
        .query_row(
            "SELECT password_salt, password_hash FROM users WHERE id = ?",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| ServiceError::not_found("user"))?;
    if !auth::verify_password(&salt, &digest, old_password) {
        return Err(ServiceError::invalid("oldPassword", "current password is incorrect"));
    }
    if old_password == new_password {
        return Err(ServiceError::invalid(
            "newPassword",
            "new password must differ from the current one",
        ));
    }
    let salt = auth::new_salt();
    let digest = auth::password_digest(&salt, new_password);
    conn.execute(
        "UPDATE users SET password_salt = ?, password_hash = ? WHERE id = ?",
        (&salt, &digest, id),
    )?;
    tracing::info!(user_id = %id, "password changed");
    Ok(())
}

/// Professor and student profile ids linked to `user_id`.
pub fn linked_profiles(
    conn: &Connection,
    user_id: &str,
) -> ServiceResult<(Option<String>, Option<String>)> {
    let professor: Option<String> = conn
        .query_row("SELECT id FROM professors WHERE user_id = ?", [user_id], |r| {
            r.get(0)
        })
        .optional()?;
    let student: Option<String> = conn
        .query_row("SELECT id FROM students WHERE user_id = ?", [user_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok((professor, student))
}

/// Fails with `Conflict` if `user_id` already backs a professor or student
/// profile other than `except_profile`.
pub fn ensure_linkable(
    conn: &Connection,
    user_id: &str,
    except_profile: Option<&str>,
) -> ServiceResult<()> {
    get(conn, user_id)?;
    let (professor, student) = linked_profiles(conn, user_id)?;
    for linked in [professor, student].into_iter().flatten() {
        if Some(linked.as_str()) != except_profile {
            return Err(ServiceError::Conflict(
                "user is already linked to another profile".into(),
            ));
        }
    }
    Ok(())
}

/// Maps the request's `actorId` to an [`Actor`]. No id means anonymous; an
/// unknown or deactivated user is refused outright.
pub fn resolve_actor(conn: &Connection, actor_id: Option<&str>) -> ServiceResult<Actor> {
    let Some(actor_id) = actor_id else {
        return Ok(Actor::Anonymous);
    };
    let user = match get(conn, actor_id) {
        Ok(u) => u,
        Err(ServiceError::NotFound(_)) => {
            return Err(ServiceError::denied("unknown actor"));
        }
        Err(e) => return Err(e),
    };
    if !user.active {
        return Err(ServiceError::denied("account is inactive"));
    }
    if user.is_admin {
        return Ok(Actor::Admin { user_id: user.id });
    }
    let profile = match linked_profiles(conn, &user.id)? {
        (Some(p), None) => Profile::Professor(p),
        (None, Some(s)) => Profile::Student(s),
        (None, None) => Profile::None,
        (Some(_), Some(_)) => {
            return Err(ServiceError::Internal(format!(
                "user {} is linked to both a professor and a student",
                user.id
            )));
        }
    };
    Ok(Actor::Authenticated {
        user_id: user.id,
        profile,
    })
}
