use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Family = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[Family] = &[
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::professors::try_handle,
    handlers::students::try_handle,
    handlers::classes::try_handle,
    handlers::enrollments::try_handle,
    handlers::attendance::try_handle,
    handlers::analytics::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    for family in FAMILIES {
        if let Some(resp) = family(state, &req) {
            return resp;
        }
    }
    tracing::debug!(request_id = %req.id, method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
