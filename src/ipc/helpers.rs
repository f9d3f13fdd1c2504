use super::error::HandlerErr;
use super::types::AppState;
use crate::error::CoreError;
use crate::store;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

/// Absent and null both read as `None`.
pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

/// Distinguishes "leave unchanged" (absent) from "clear" (null).
pub fn patch_str(params: &Value, key: &str) -> Result<Option<Option<String>>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "{} must be a string or null",
            key
        ))),
    }
}

pub fn optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    optional_i64(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn required_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    match params.get(key) {
        Some(Value::Null) | None => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

/// `params.term`, or the school profile's current term when omitted.
pub fn term_param(conn: &Connection, params: &Value) -> Result<String, HandlerErr> {
    if let Some(term) = optional_str(params, "term")? {
        return Ok(term);
    }
    match store::get_school_profile(conn)? {
        Some(profile) => Ok(profile.term),
        None => Err(CoreError::validation(
            "term is required until a school profile sets the current term",
        )
        .into()),
    }
}
