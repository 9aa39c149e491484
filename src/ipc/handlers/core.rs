use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::remote::RemoteStore;
use crate::store::Dataset;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "storeUrl": state.remote.as_ref().map(|r| r.url().to_string()),
            "loaded": state.data.is_some(),
        }),
    )
}

/// Loads a document (or an empty one) as the working dataset without a
/// remote store. Used by tests and offline operation; mutations then keep
/// local state only.
fn handle_store_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = match req.params.get("data") {
        None => Dataset::default(),
        Some(v) if v.is_null() => Dataset::default(),
        Some(v) => match serde_json::from_value::<Dataset>(v.clone()) {
            Ok(d) => d,
            Err(e) => return err(&req.id, "bad_params", format!("data: {}", e), None),
        },
    };
    tracing::info!(
        "opened local dataset: {} students, {} courses",
        data.students.len(),
        data.courses.len()
    );
    let counts = helpers::collection_counts(&data);
    state.remote = None;
    state.data = Some(data);
    ok(&req.id, json!({ "counts": counts }))
}

fn handle_store_connect(state: &mut AppState, req: &Request) -> serde_json::Value {
    let url = match helpers::required_str(req, "url") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut remote = RemoteStore::new(&url, state.store_timeout);
    match remote.fetch() {
        Ok(data) => {
            tracing::info!("connected to store at {}", url);
            let counts = helpers::collection_counts(&data);
            let version = remote.version().map(|v| v.to_string());
            state.remote = Some(remote);
            state.data = Some(data);
            ok(
                &req.id,
                json!({ "storeUrl": url, "version": version, "counts": counts }),
            )
        }
        Err(e) => {
            tracing::error!("store connect failed for {}: {}", url, e.message);
            err(&req.id, e.code, e.message, None)
        }
    }
}

/// Replaces local state with a fresh copy of the remote document. This is
/// the recovery path after a failed or conflicted save.
fn handle_store_reload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let remote = match state.remote.as_mut() {
        Some(r) => r,
        None => return err(&req.id, "no_store", "no remote store attached", None),
    };
    match remote.fetch() {
        Ok(data) => {
            let counts = helpers::collection_counts(&data);
            let version = remote.version().map(|v| v.to_string());
            state.data = Some(data);
            ok(&req.id, json!({ "version": version, "counts": counts }))
        }
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

fn handle_store_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = match state.data.as_ref() {
        Some(d) => d,
        None => return err(&req.id, "no_store", "open or connect a store first", None),
    };
    let remote = match state.remote.as_mut() {
        Some(r) => r,
        None => return err(&req.id, "no_store", "no remote store attached", None),
    };
    match remote.push(data) {
        Ok(version) => ok(&req.id, json!({ "version": version })),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

fn handle_store_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let doc = match serde_json::to_value(data) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_document", e.to_string(), None),
    };
    let version = state.remote.as_ref().and_then(|r| r.version().map(|v| v.to_string()));
    ok(&req.id, json!({ "data": doc, "version": version }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "store.open" => Some(handle_store_open(state, req)),
        "store.connect" => Some(handle_store_connect(state, req)),
        "store.reload" => Some(handle_store_reload(state, req)),
        "store.save" => Some(handle_store_save(state, req)),
        "store.get" => Some(handle_store_get(state, req)),
        _ => None,
    }
}
