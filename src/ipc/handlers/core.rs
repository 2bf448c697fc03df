use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Collection, RecordStore, SqliteStore};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (creating if needed) the workspace database and makes it current.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    // Release the previous workspace before opening another; a failed open
    // leaves no workspace selected.
    state.store = None;
    state.workspace = None;
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.store = Some(SqliteStore::new(conn));
    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn collection_counts(store: &SqliteStore) -> Result<Value, store::StoreError> {
    let mut counts = Map::new();
    for c in Collection::ALL {
        counts.insert(c.name().to_string(), Value::from(store.get(c.name())?.len()));
    }
    Ok(Value::Object(counts))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => {
            let counts = match state.store.as_ref().map(collection_counts) {
                Some(Ok(v)) => v,
                Some(Err(e)) => return err(&req.id, e.code(), e.to_string(), None),
                None => Value::Null,
            };
            ok(
                &req.id,
                json!({ "workspacePath": path.to_string_lossy(), "collections": counts }),
            )
        }
        Err(e) => {
            tracing::warn!(workspace = %path.display(), error = %e, "workspace open failed");
            err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
