use crate::error::CoreError;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::ranking::{self, TieBreak};
use serde_json::json;

fn handle_ranking_get(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    Ok(json!({ "tieBreak": ranking::load_tie_break(conn).as_str() }))
}

fn handle_ranking_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let raw = required_str(&req.params, "tieBreak")?;
    let Some(tie_break) = TieBreak::parse(&raw) else {
        return Err(HandlerErr::from(CoreError::validation(format!(
            "tieBreak must be \"name\" or \"admissionNumber\", got {}",
            raw
        ))));
    };
    ranking::save_tie_break(conn, tie_break)
        .map_err(|e| HandlerErr::new("db_error", format!("{:#}", e)))?;
    Ok(json!({ "tieBreak": tie_break.as_str() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.ranking.get" => handle_ranking_get(state, req),
        "settings.ranking.update" => handle_ranking_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
