use serde_json::json;
use thiserror::Error;

use crate::ipc::error::err;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(format!("{} not found", what))
    }

    pub fn denied(message: impl Into<String>) -> Self {
        ServiceError::PermissionDenied(message.into())
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::PermissionDenied(_) => "permission_denied",
            ServiceError::Validation { .. } => "bad_params",
            ServiceError::NoWorkspace => "no_workspace",
            ServiceError::Database(_) | ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to hand back to the caller. Storage failures never leak
    /// their underlying detail.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        if matches!(self, ServiceError::Database(_) | ServiceError::Internal(_)) {
            tracing::error!(request_id = id, error = %self, "request failed");
        }
        let details = match &self {
            ServiceError::Validation {
                field: Some(field), ..
            } => Some(json!({ "field": field })),
            _ => None,
        };
        err(id, self.code(), self.public_message(), details)
    }
}

/// True when `e` is a UNIQUE or PRIMARY KEY violation.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => {
            f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// Maps a unique violation on insert/update into `Conflict`, everything else
/// into a storage failure.
pub fn conflict_on_unique(e: rusqlite::Error, message: &str) -> ServiceError {
    if is_unique_violation(&e) {
        ServiceError::Conflict(message.to_string())
    } else {
        ServiceError::Database(e)
    }
}
