use crate::integrity::{self, Reparented};
use crate::ipc::error::{respond, HandlerResult};
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, required_i64, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, SubjectPatch};
use serde_json::json;

pub(super) fn affected_class_ids(reparented: &Option<Reparented>) -> Vec<String> {
    reparented
        .as_ref()
        .map(Reparented::affected_class_ids)
        .unwrap_or_default()
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let subjects = store::list_subjects(conn, &class_id)?;
    Ok(json!({ "subjects": to_json(&subjects)? }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let name = required_str(&req.params, "name")?;
    let coefficient = required_i64(&req.params, "coefficient")?;
    let subject_id = store::create_subject(conn, &class_id, &name, coefficient)?;
    Ok(json!({ "subjectId": subject_id }))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let patch = SubjectPatch {
        name: optional_str(&req.params, "name")?,
        coefficient: optional_i64(&req.params, "coefficient")?,
        class_id: optional_str(&req.params, "classId")?,
    };
    let updated = store::update_subject(conn, &subject_id, &patch)?;
    Ok(json!({
        "subject": to_json(&updated.entity)?,
        "reparented": to_json(&updated.reparented)?,
        "affectedClassIds": affected_class_ids(&updated.reparented),
    }))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let deleted = integrity::delete_subject(conn, &subject_id)?;
    Ok(json!({ "ok": true, "deleted": to_json(&deleted)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => handle_subjects_list(state, req),
        "subjects.create" => handle_subjects_create(state, req),
        "subjects.update" => handle_subjects_update(state, req),
        "subjects.delete" => handle_subjects_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
