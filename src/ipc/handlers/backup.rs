use crate::backup;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn non_empty_path(req: &Request, key: &str) -> Result<PathBuf, HandlerErr> {
    let raw = required_str(&req.params, key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(PathBuf::from(trimmed))
}

fn workspace_param(state: &AppState, req: &Request) -> Result<PathBuf, HandlerErr> {
    optional_str(&req.params, "workspacePath")?
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn handle_export_workspace_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    let out_path = non_empty_path(req, "outPath")?;
    let workspace_path = workspace_param(state, req)?;

    if let Some(conn) = state.db.as_ref() {
        // Fold the WAL into the main file before copying it.
        if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(FULL)") {
            log::warn!("wal checkpoint before export failed: {}", e);
        }
    }

    let export = backup::export_workspace_bundle(&workspace_path, &out_path).map_err(|e| {
        HandlerErr::new("io_failed", format!("{:#}", e))
            .with_details(json!({ "path": out_path.to_string_lossy() }))
    })?;
    log::info!(
        "exported workspace {} to {}",
        workspace_path.to_string_lossy(),
        out_path.to_string_lossy()
    );

    Ok(json!({
        "ok": true,
        "path": out_path.to_string_lossy(),
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256,
    }))
}

fn handle_import_workspace_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    let in_path = non_empty_path(req, "inPath")?;
    let workspace_path = workspace_param(state, req)?;

    if !in_path.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path.to_string_lossy() })));
    }

    // The open handle must go before the file is replaced.
    let reopen_current = state.workspace.as_deref() == Some(workspace_path.as_path());
    if reopen_current {
        state.close_db();
    }

    let imported = backup::import_workspace_bundle(&in_path, &workspace_path);
    let import = match imported {
        Ok(v) => v,
        Err(e) => {
            if reopen_current {
                if let Err(reopen) = state.open_workspace(&workspace_path) {
                    log::error!("failed to reopen workspace after import error: {:#}", reopen);
                }
            }
            return Err(HandlerErr::new("io_failed", format!("{:#}", e))
                .with_details(json!({ "path": in_path.to_string_lossy() })));
        }
    };

    state.open_workspace(&workspace_path).map_err(|e| {
        HandlerErr::new("db_open_failed", format!("{:#}", e))
            .with_details(json!({ "path": workspace_path.to_string_lossy() }))
    })?;
    log::info!(
        "imported {} into {} ({})",
        in_path.to_string_lossy(),
        workspace_path.to_string_lossy(),
        import.bundle_format_detected
    );

    Ok(json!({
        "ok": true,
        "workspacePath": workspace_path.to_string_lossy(),
        "bundleFormatDetected": import.bundle_format_detected,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => handle_export_workspace_bundle(state, req),
        "backup.importWorkspaceBundle" => handle_import_workspace_bundle(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
