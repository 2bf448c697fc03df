use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, get_role, now_rfc3339, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use crate::workflow::{self, Decision, Lane, RequestFilter, RequestStatus, Role, Submission};
use serde_json::{json, Value};

fn get_lane(params: &Value, required: bool) -> Result<Option<Lane>, HandlerErr> {
    match get_optional_str(params, "lane") {
        None if required => Err(HandlerErr::new("bad_params", "missing lane")),
        None => Ok(None),
        Some(raw) => Lane::parse(&raw).map(Some).ok_or_else(|| {
            HandlerErr::new("bad_params", format!("unknown lane: {}", raw))
                .with_details(json!({ "allowed": ["staff", "admin"] }))
        }),
    }
}

fn requests_submit(store: &mut SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let role = get_role(params)?;
    let lane = get_lane(params, true)?.unwrap_or(Lane::Admin);
    let submission = Submission {
        student_id: get_required_str(params, "studentId")?,
        lane,
        field: get_required_str(params, "field")?,
        current_value: params
            .get("currentValue")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        new_value: params
            .get("newValue")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| HandlerErr::new("bad_params", "missing newValue"))?,
    };
    let request = workflow::submit(store, role, submission, &now_rfc3339())?;
    Ok(json!({ "request": request }))
}

fn requests_list(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let status = match get_optional_str(params, "status") {
        None => None,
        Some(raw) => Some(RequestStatus::parse(&raw).ok_or_else(|| {
            HandlerErr::new("bad_params", format!("unknown status: {}", raw))
        })?),
    };
    let filter = RequestFilter {
        lane: get_lane(params, false)?,
        status,
        student_id: get_optional_str(params, "studentId"),
    };
    let requests = workflow::list(store, &filter)?;
    Ok(json!({ "requests": requests }))
}

fn requests_queue(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let role = get_role(params)?;
    let student_id = get_optional_str(params, "studentId");
    if matches!(role, Role::Student | Role::Parent) && student_id.is_none() {
        return Err(HandlerErr::new(
            "bad_params",
            "studentId is required for student and parent queues",
        ));
    }
    let requests = workflow::list(store, &RequestFilter::queue_for(role, student_id))?;
    Ok(json!({ "requests": requests }))
}

fn requests_decide(
    store: &mut SqliteStore,
    params: &Value,
    decision: Decision,
) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    let role = get_role(params)?;
    let outcome = workflow::decide(store, &id, decision, role, &now_rfc3339())?;
    Ok(json!(outcome))
}

fn handle_requests_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match requests_submit(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_requests_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match requests_list(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_requests_queue(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match requests_queue(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_requests_decide(
    state: &mut AppState,
    req: &Request,
    decision: Decision,
) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match requests_decide(store, &req.params, decision) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "requests.submit" => Some(handle_requests_submit(state, req)),
        "requests.list" => Some(handle_requests_list(state, req)),
        "requests.queue" => Some(handle_requests_queue(state, req)),
        "requests.verify" => Some(handle_requests_decide(state, req, Decision::Verify)),
        "requests.approve" => Some(handle_requests_decide(state, req, Decision::Approve)),
        "requests.reject" => Some(handle_requests_decide(state, req, Decision::Reject)),
        _ => None,
    }
}
