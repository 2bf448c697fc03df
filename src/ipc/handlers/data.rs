use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_u32, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::seed::{self, DEFAULT_STUDENTS_PER_DEPARTMENT, MAX_STUDENTS_PER_DEPARTMENT};
use crate::store::{self, SqliteStore};
use serde_json::{json, Value};

fn data_seed(store: &mut SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let per_department = get_optional_u32(params, "studentsPerDepartment")?
        .unwrap_or(DEFAULT_STUDENTS_PER_DEPARTMENT);
    if !(1..=MAX_STUDENTS_PER_DEPARTMENT).contains(&per_department) {
        return Err(HandlerErr::new(
            "bad_params",
            format!(
                "studentsPerDepartment must be in 1..={}",
                MAX_STUDENTS_PER_DEPARTMENT
            ),
        ));
    }
    let summary = seed::seed_sample_data(store, per_department)?;
    Ok(json!(summary))
}

fn data_reset(store: &mut SqliteStore) -> Result<Value, HandlerErr> {
    store::reset_all(store)?;
    tracing::info!("all collections cleared");
    Ok(json!({ "ok": true }))
}

fn handle_data_seed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match data_seed(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_data_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match data_reset(store) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "data.seed" => Some(handle_data_seed(state, req)),
        "data.reset" => Some(handle_data_reset(state, req)),
        _ => None,
    }
}
