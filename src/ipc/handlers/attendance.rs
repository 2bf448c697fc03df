use crate::attendance::{self, AttendanceEntry};
use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, AttendanceStatus};
use crate::store::{self, Collection, SqliteStore};
use serde_json::{json, Value};

fn parse_status(raw: &str) -> Option<AttendanceStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "present" | "p" => Some(AttendanceStatus::Present),
        "absent" | "a" => Some(AttendanceStatus::Absent),
        _ => None,
    }
}

fn attendance_mark(store: &mut SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let date = get_required_str(params, "date")?;
    let Some(raw) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "entries must be an array"));
    };
    let mut entries = Vec::with_capacity(raw.len());
    for (i, e) in raw.iter().enumerate() {
        let student_id = get_required_str(e, "studentId")
            .map_err(|he| he.with_details(json!({ "index": i })))?;
        let status = e
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(parse_status)
            .ok_or_else(|| {
                HandlerErr::new("bad_params", "status must be present or absent")
                    .with_details(json!({ "index": i }))
            })?;
        entries.push(AttendanceEntry { student_id, status });
    }
    let saved = attendance::mark_day(store, &date, &entries)?;
    Ok(json!({ "date": date, "count": saved.len() }))
}

fn attendance_summary(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let department = get_optional_str(params, "department");
    let threshold = setup::shortage_threshold(store.conn())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let mut records: Vec<AttendanceRecord> = store::load(store, Collection::Attendance)?;
    if let Some(student_id) = get_optional_str(params, "studentId") {
        records.retain(|r| r.student_id == student_id);
    }
    let rows = calc::attendance_summary(&records, department.as_deref(), threshold);
    Ok(json!({ "shortageThresholdPercent": threshold, "students": rows }))
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_mark(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_summary(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.summary" => Some(handle_attendance_summary(state, req)),
        _ => None,
    }
}
