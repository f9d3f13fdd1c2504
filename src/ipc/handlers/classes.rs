use crate::integrity;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, optional_i64, optional_str, required_i64, required_str, to_json};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    // Listing before a workspace is open is not an error for the class picker.
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "classes": [] }));
    };
    let classes = store::list_classes(conn)?;
    Ok(json!({ "classes": to_json(&classes)? }))
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let Some(class) = store::get_class(conn, &class_id)? else {
        return Err(HandlerErr::new("not_found", "class not found")
            .with_details(json!({ "classId": class_id })));
    };
    let subjects = store::list_subjects(conn, &class.id)?;
    let pupils = store::list_pupils(conn, Some(&class.id), None)?;
    Ok(json!({
        "class": to_json(&class)?,
        "subjects": to_json(&subjects)?,
        "pupils": to_json(&pupils)?,
    }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let name = required_str(&req.params, "name")?;
    let level = required_i64(&req.params, "level")?;
    let class_id = store::create_class(conn, &name, level)?;
    Ok(json!({ "classId": class_id, "name": name.trim(), "level": level }))
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let name = optional_str(&req.params, "name")?;
    let level = optional_i64(&req.params, "level")?;
    let class = store::update_class(conn, &class_id, name.as_deref(), level)?;
    Ok(json!({ "class": to_json(&class)? }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let deleted = integrity::delete_class(conn, &class_id)?;
    Ok(json!({ "ok": true, "deleted": to_json(&deleted)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_classes_list(state, req),
        "classes.get" => handle_classes_get(state, req),
        "classes.create" => handle_classes_create(state, req),
        "classes.update" => handle_classes_update(state, req),
        "classes.delete" => handle_classes_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
