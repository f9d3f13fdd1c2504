use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: [TryHandle; 9] = [
    handlers::core::try_handle,
    handlers::school::try_handle,
    handlers::classes::try_handle,
    handlers::subjects::try_handle,
    handlers::pupils::try_handle,
    handlers::marks::try_handle,
    handlers::reports::try_handle,
    handlers::settings::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    log::debug!("request {} {}", req.id, req.method);
    for try_handle in HANDLERS {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    log::warn!("unknown method: {}", req.method);
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
