use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::normalize_record;
use crate::store::{self, record_id, Collection, RecordStore, SqliteStore};
use serde_json::{json, Value};
use uuid::Uuid;

fn get_collection(params: &Value) -> Result<Collection, HandlerErr> {
    let name = get_required_str(params, "collection")?;
    Collection::parse(&name).ok_or_else(|| {
        HandlerErr::new("bad_params", format!("unknown collection: {}", name)).with_details(json!({
            "allowed": Collection::ALL.iter().map(|c| c.name()).collect::<Vec<_>>()
        }))
    })
}

/// Exact-match filter on top-level fields; non-string values compare as JSON.
fn matches_where(record: &Value, filter: &serde_json::Map<String, Value>) -> bool {
    filter.iter().all(|(k, want)| record.get(k) == Some(want))
}

fn records_list(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    let filter = match params.get("where") {
        None | Some(Value::Null) => None,
        Some(Value::Object(m)) => Some(m),
        Some(_) => return Err(HandlerErr::new("bad_params", "where must be an object")),
    };
    let records: Vec<Value> = store
        .get(collection.name())?
        .into_iter()
        .filter(|r| filter.map(|f| matches_where(r, f)).unwrap_or(true))
        .collect();
    Ok(json!({ "collection": collection.name(), "records": records }))
}

fn records_get(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    let id = get_required_str(params, "id")?;
    match store::find_by_id(store, collection, &id)? {
        Some(record) => Ok(json!({ "record": record })),
        None => Err(HandlerErr::new("not_found", format!("{} record not found", collection.name()))
            .with_details(json!({ "id": id }))),
    }
}

fn records_upsert(store: &mut SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    match collection {
        Collection::Marks => {
            return Err(HandlerErr::new("not_permitted", "marks are written through marks.record"))
        }
        Collection::ChangeRequests => {
            return Err(HandlerErr::new(
                "not_permitted",
                "change requests are written through requests.*",
            ))
        }
        _ => {}
    }
    let Some(mut record) = params.get("record").filter(|v| v.is_object()).cloned() else {
        return Err(HandlerErr::new("bad_params", "record must be an object"));
    };
    let created = record_id(&record).map(|s| s.trim().is_empty()).unwrap_or(true);
    if created {
        record["id"] = Value::String(Uuid::new_v4().to_string());
    }
    let record = normalize_record(collection, record).map_err(|e| {
        HandlerErr::new("invalid_value", format!("invalid {} record: {}", collection.name(), e))
    })?;
    store::upsert_by_id(store, collection, record.clone())?;
    Ok(json!({ "record": record, "created": created }))
}

fn records_delete(store: &mut SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    if collection == Collection::ChangeRequests {
        return Err(HandlerErr::new(
            "not_permitted",
            "change requests are only cleared by data.reset",
        ));
    }
    let id = get_required_str(params, "id")?;
    if !store::delete_by_id(store, collection, &id)? {
        return Err(HandlerErr::new("not_found", format!("{} record not found", collection.name()))
            .with_details(json!({ "id": id })));
    }
    Ok(json!({ "ok": true }))
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match records_list(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_records_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match records_get(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_records_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match records_upsert(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_records_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match records_delete(store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.list" => Some(handle_records_list(state, req)),
        "records.get" => Some(handle_records_get(state, req)),
        "records.upsert" => Some(handle_records_upsert(state, req)),
        "records.delete" => Some(handle_records_delete(state, req)),
        _ => None,
    }
}
