use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, ReportOptions};
use crate::store::SqliteStore;
use serde_json::{json, Value};
use std::path::PathBuf;

fn report_options(store: &SqliteStore) -> Result<ReportOptions, HandlerErr> {
    setup::report_options(store.conn()).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

/// Returns the CSV text, writing it to `outPath` first when one is given.
fn deliver_csv(csv: String, params: &Value) -> Result<Value, HandlerErr> {
    let Some(out_path) = get_optional_str(params, "outPath") else {
        return Ok(json!({ "csv": csv }));
    };
    let out = PathBuf::from(&out_path);
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": out_path }))
        })?;
    }
    std::fs::write(&out, csv.as_bytes()).map_err(|e| {
        HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": out_path }))
    })?;
    Ok(json!({ "csv": csv, "path": out_path }))
}

fn reports_student_csv(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let opts = report_options(store)?;
    let csv = reports::student_report_csv(store, &student_id, &opts)?;
    deliver_csv(csv, params)
}

fn reports_roster_csv(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let department = get_optional_str(params, "department");
    let opts = report_options(store)?;
    let csv = reports::roster_csv(store, department.as_deref(), &opts)?;
    deliver_csv(csv, params)
}

fn handle_reports_student_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match reports_student_csv(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_reports_roster_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match reports_roster_csv(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentCsv" => Some(handle_reports_student_csv(state, req)),
        "reports.rosterCsv" => Some(handle_reports_roster_csv(state, req)),
        _ => None,
    }
}
