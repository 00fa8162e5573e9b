//! Input checks shared by the write handlers. Lengths count characters, not
//! bytes.

use crate::auth::MIN_PASSWORD_LEN;
use crate::error::{ServiceError, ServiceResult};

pub const NAME_MAX: usize = 200;
pub const DEPARTMENT_MAX: usize = 100;
pub const COURSE_MAX: usize = 100;
pub const REGISTRATION_MAX: usize = 20;
pub const USERNAME_MAX: usize = 150;
pub const EMAIL_MAX: usize = 254;

/// Trims `raw` and requires `1..=max` characters.
pub fn text(field: &str, raw: &str, max: usize) -> ServiceResult<String> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(ServiceError::invalid(field, format!("{} must not be empty", field)));
    }
    let len = v.chars().count();
    if len > max {
        return Err(ServiceError::invalid(
            field,
            format!("{} must be at most {} characters (got {})", field, max, len),
        ));
    }
    Ok(v.to_string())
}

pub fn email(field: &str, raw: &str) -> ServiceResult<String> {
    let v = text(field, raw, EMAIL_MAX)?.to_ascii_lowercase();
    let valid = match v.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !v.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::invalid(field, format!("{} is not a valid email address", field)));
    }
    Ok(v)
}

pub fn new_password(field: &str, password: &str, confirm: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::invalid(
            field,
            format!("password must have at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if password != confirm {
        return Err(ServiceError::invalid(field, "passwords do not match"));
    }
    Ok(())
}
