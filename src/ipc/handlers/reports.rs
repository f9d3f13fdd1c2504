use crate::calc;
use crate::ipc::error::{respond, HandlerResult};
use crate::ipc::helpers::{db_conn, required_str, term_param, to_json};
use crate::ipc::types::{AppState, Request};
use crate::ranking;
use crate::reports;
use crate::store;
use serde_json::json;

fn handle_results_compute(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let pupil_id = required_str(&req.params, "pupilId")?;
    let term = term_param(conn, &req.params)?;
    let result = calc::compute_result(conn, &pupil_id, &term)?;
    Ok(json!({ "pupilId": pupil_id, "term": term, "result": to_json(&result)? }))
}

fn handle_ranking_compute(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let term = term_param(conn, &req.params)?;
    let ranking = ranking::compute_ranking(conn, &class_id, &term)?;
    to_json(&ranking)
}

fn handle_reports_report_card(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let pupil_id = required_str(&req.params, "pupilId")?;
    let term = term_param(conn, &req.params)?;
    let card = reports::report_card(conn, &pupil_id, &term)?;
    to_json(&card)
}

fn handle_dashboard_summary(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let summary = store::dashboard_summary(conn)?;
    to_json(&summary)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "results.compute" => handle_results_compute(state, req),
        "ranking.compute" => handle_ranking_compute(state, req),
        "reports.reportCard" => handle_reports_report_card(state, req),
        "dashboard.summary" => handle_dashboard_summary(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
