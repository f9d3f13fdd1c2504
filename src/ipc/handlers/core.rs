use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, _req: &Request) -> HandlerResult {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> HandlerResult {
    let path = required_str(&req.params, "path")?;
    if path.trim().is_empty() {
        return Err(HandlerErr::bad_params("path must not be empty"));
    }
    let path = PathBuf::from(path.trim());
    state.open_workspace(&path).map_err(|e| {
        log::warn!("failed to open workspace {}: {:#}", path.to_string_lossy(), e);
        HandlerErr::new("db_open_failed", format!("{:#}", e))
            .with_details(json!({ "path": path.to_string_lossy() }))
    })?;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
