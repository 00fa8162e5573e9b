mod auth;
mod calc;
mod config;
mod db;
mod error;
mod ipc;
mod model;
mod permissions;
mod reports;
mod store;
mod validate;

use std::io::{self, BufRead, Write};

use serde_json::json;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let config = config::Config::load();
    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        db_file: config.db_file,
    };
    if let Some(path) = config.workspace {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(error = ?e, "failed to open configured workspace");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rollcalld ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // No id to echo back.
            Err(e) => json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() },
            }),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
