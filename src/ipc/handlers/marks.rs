use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{get_optional_str, get_required_f64, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::marks::{self, Assessment, BulkEntry};
use crate::store::SqliteStore;
use serde_json::{json, Value};

fn current_academic_year(store: &SqliteStore) -> Result<String, HandlerErr> {
    setup::academic_year(store.conn()).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn marks_record(store: &mut SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let input = Assessment {
        student_id: get_required_str(params, "studentId")?,
        subject_id: get_required_str(params, "subjectId")?,
        assessment_type: get_required_str(params, "assessmentType")?,
        marks_obtained: get_required_f64(params, "marksObtained")?,
    };
    let year = current_academic_year(store)?;
    let mark = marks::record_assessment(store, &input, &year)?;
    Ok(json!({ "mark": mark }))
}

fn marks_record_bulk(store: &mut SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let assessment_type = get_required_str(params, "assessmentType")?;
    let Some(raw) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "entries must be an array"));
    };
    let mut entries = Vec::with_capacity(raw.len());
    for (i, e) in raw.iter().enumerate() {
        let entry = get_required_str(e, "studentId")
            .and_then(|student_id| {
                Ok(BulkEntry {
                    student_id,
                    marks_obtained: get_required_f64(e, "marksObtained")?,
                })
            })
            .map_err(|he| he.with_details(json!({ "index": i })))?;
        entries.push(entry);
    }
    let year = current_academic_year(store)?;
    let saved = marks::record_bulk(store, &subject_id, &assessment_type, &entries, &year)?;
    Ok(json!({ "count": saved.len(), "marks": saved }))
}

fn marks_list(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_optional_str(params, "studentId");
    let subject_id = get_optional_str(params, "subjectId");
    let marks = marks::list_marks(store, student_id.as_deref(), subject_id.as_deref())?;
    Ok(json!({ "marks": marks }))
}

fn handle_marks_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match marks_record(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_marks_record_bulk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match marks_record_bulk(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_marks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match marks_list(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.record" => Some(handle_marks_record(state, req)),
        "marks.recordBulk" => Some(handle_marks_record_bulk(state, req)),
        "marks.list" => Some(handle_marks_list(state, req)),
        _ => None,
    }
}
