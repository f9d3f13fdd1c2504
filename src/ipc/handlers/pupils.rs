use super::subjects::affected_class_ids;
use crate::error::CoreError;
use crate::integrity;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, optional_str, patch_str, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, NewPupil, PupilPatch, Sex};
use serde_json::json;

fn parse_sex(raw: &str) -> Result<Sex, HandlerErr> {
    Sex::parse(raw)
        .ok_or_else(|| CoreError::validation(format!("sex must be Male or Female, got {}", raw)).into())
}

fn handle_pupils_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = optional_str(&req.params, "classId")?;
    let search = optional_str(&req.params, "search")?;
    let pupils = store::list_pupils(conn, class_id.as_deref(), search.as_deref())?;
    Ok(json!({ "pupils": to_json(&pupils)? }))
}

fn handle_pupils_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let pupil_id = required_str(&req.params, "pupilId")?;
    let Some(pupil) = store::get_pupil(conn, &pupil_id)? else {
        return Err(HandlerErr::new("not_found", "pupil not found")
            .with_details(json!({ "pupilId": pupil_id })));
    };
    Ok(json!({ "pupil": to_json(&pupil)? }))
}

fn handle_pupils_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let pupil = NewPupil {
        name: required_str(&req.params, "name")?,
        admission_number: required_str(&req.params, "admissionNumber")?,
        sex: parse_sex(&required_str(&req.params, "sex")?)?,
        date_of_birth: optional_str(&req.params, "dateOfBirth")?,
    };
    let pupil_id = store::create_pupil(conn, &class_id, &pupil)?;
    Ok(json!({ "pupilId": pupil_id }))
}

fn handle_pupils_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let pupil_id = required_str(&req.params, "pupilId")?;
    let sex = optional_str(&req.params, "sex")?
        .map(|s| parse_sex(&s))
        .transpose()?;
    let patch = PupilPatch {
        name: optional_str(&req.params, "name")?,
        admission_number: optional_str(&req.params, "admissionNumber")?,
        sex,
        date_of_birth: patch_str(&req.params, "dateOfBirth")?,
        class_id: optional_str(&req.params, "classId")?,
    };
    let updated = store::update_pupil(conn, &pupil_id, &patch)?;
    Ok(json!({
        "pupil": to_json(&updated.entity)?,
        "reparented": to_json(&updated.reparented)?,
        "affectedClassIds": affected_class_ids(&updated.reparented),
    }))
}

fn handle_pupils_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let pupil_id = required_str(&req.params, "pupilId")?;
    let deleted = integrity::delete_pupil(conn, &pupil_id)?;
    Ok(json!({ "ok": true, "deleted": to_json(&deleted)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "pupils.list" => handle_pupils_list(state, req),
        "pupils.get" => handle_pupils_get(state, req),
        "pupils.create" => handle_pupils_create(state, req),
        "pupils.update" => handle_pupils_update(state, req),
        "pupils.delete" => handle_pupils_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
