use std::{env, path::PathBuf};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ROLLCALL_LOG";
const WORKSPACE_ENV: &str = "ROLLCALL_WORKSPACE";
const DB_FILE_ENV: &str = "ROLLCALL_DB_FILE";
pub const DEFAULT_DB_FILE: &str = "rollcall.sqlite3";

pub struct Config {
    pub workspace: Option<PathBuf>,
    pub db_file: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            workspace: var(WORKSPACE_ENV).map(PathBuf::from),
            db_file: load_db_file(),
        }
    }
}

/// `ROLLCALL_LOG` wins over `RUST_LOG`; both fall back to `info`.
pub fn log_filter() -> EnvFilter {
    var(LOG_ENV)
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn load_db_file() -> String {
    match var(DB_FILE_ENV) {
        None => {
            info!("{DB_FILE_ENV} not set, using default: {DEFAULT_DB_FILE}");
            DEFAULT_DB_FILE.to_string()
        }
        Some(name) if is_plain_file_name(&name) => name,
        Some(name) => {
            warn!("Invalid {DB_FILE_ENV} value {name:?}, using default: {DEFAULT_DB_FILE}");
            DEFAULT_DB_FILE.to_string()
        }
    }
}

/// The database always lives directly inside the workspace directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.contains('/') && !name.contains('\\') && name != "." && name != ".."
}
