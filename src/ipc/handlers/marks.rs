use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{db_conn, required_f64, required_str, term_param, to_json};
use crate::ipc::types::{AppState, Request};
use crate::marks::{self, MarkEntry};
use crate::store;
use serde_json::{json, Value};

fn parse_entries(params: &Value) -> Result<Vec<MarkEntry>, HandlerErr> {
    let Some(items) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    let mut entries = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(pupil_id) = item.get("pupilId").and_then(|v| v.as_str()) else {
            return Err(HandlerErr::bad_params(format!("entries[{}]: missing pupilId", i)));
        };
        let score = match item.get("score") {
            Some(Value::Null) => None,
            Some(v) => match v.as_f64() {
                Some(n) => Some(n),
                None => {
                    return Err(HandlerErr::bad_params(format!(
                        "entries[{}]: score must be a number or null",
                        i
                    )))
                }
            },
            None => {
                return Err(HandlerErr::bad_params(format!("entries[{}]: missing score", i)))
            }
        };
        entries.push(MarkEntry {
            pupil_id: pupil_id.to_string(),
            score,
        });
    }
    Ok(entries)
}

fn handle_marks_sheet(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let term = term_param(conn, &req.params)?;
    let sheet = marks::marks_sheet(conn, &subject_id, &term)?;
    to_json(&sheet)
}

fn handle_marks_record(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let pupil_id = required_str(&req.params, "pupilId")?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let score = required_f64(&req.params, "score")?;
    let term = term_param(conn, &req.params)?;
    let mark = marks::record_mark(conn, &pupil_id, &subject_id, &term, score)?;
    Ok(json!({ "mark": to_json(&mark)? }))
}

fn handle_marks_bulk_record(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let entries = parse_entries(&req.params)?;
    let term = term_param(conn, &req.params)?;
    let outcome = marks::record_marks(conn, &subject_id, &term, &entries)?;
    to_json(&outcome)
}

fn handle_marks_clear(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let pupil_id = required_str(&req.params, "pupilId")?;
    let subject_id = required_str(&req.params, "subjectId")?;
    let term = term_param(conn, &req.params)?;
    let cleared = marks::clear_mark(conn, &pupil_id, &subject_id, &term)?;
    Ok(json!({ "cleared": cleared }))
}

fn handle_marks_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let mark_id = required_str(&req.params, "markId")?;
    let existing = store::get_mark(conn, &mark_id)?;
    let deleted = marks::delete_mark(conn, &mark_id)?;
    Ok(json!({ "deleted": deleted, "mark": to_json(&existing)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "marks.sheet" => handle_marks_sheet(state, req),
        "marks.record" => handle_marks_record(state, req),
        "marks.bulkRecord" => handle_marks_bulk_record(state, req),
        "marks.clear" => handle_marks_clear(state, req),
        "marks.delete" => handle_marks_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
