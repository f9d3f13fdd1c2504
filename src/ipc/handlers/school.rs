use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, optional_str, patch_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, SchoolProfilePatch};
use serde_json::json;

fn profile_patch(params: &serde_json::Value) -> Result<SchoolProfilePatch, HandlerErr> {
    Ok(SchoolProfilePatch {
        name: optional_str(params, "name")?,
        academic_year: optional_str(params, "academicYear")?,
        term: optional_str(params, "term")?,
        logo: patch_str(params, "logo")?,
    })
}

fn handle_school_get(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let school = store::get_school_profile(conn)?;
    Ok(json!({ "school": to_json(&school)? }))
}

fn handle_school_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let patch = profile_patch(&req.params)?;
    let school = store::create_school_profile(conn, &patch)?;
    Ok(json!({ "school": to_json(&school)? }))
}

fn handle_school_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let patch = profile_patch(&req.params)?;
    let school = store::upsert_school_profile(conn, &patch)?;
    Ok(json!({ "school": to_json(&school)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "school.get" => handle_school_get(state, req),
        "school.create" => handle_school_create(state, req),
        "school.upsert" => handle_school_upsert(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
