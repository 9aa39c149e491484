use serde_json::{json, Value as JsonValue};

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::{Dataset, EngineError};

pub fn dataset<'a>(state: &'a AppState, req: &Request) -> Result<&'a Dataset, serde_json::Value> {
    state
        .data
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_store", "open or connect a store first", None))
}

pub fn dataset_mut<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut Dataset, serde_json::Value> {
    state
        .data
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_store", "open or connect a store first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?.trim().to_string();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
    }
}

/// Absent or null means "not provided"; an array (possibly empty) is the
/// provided selection. Blank ids are dropped, duplicates kept (the
/// enrollment manager collapses them).
pub fn parse_opt_string_array(
    v: Option<&JsonValue>,
) -> Result<Option<Vec<String>>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let arr = v.as_array().ok_or("must be array of strings")?;
            let mut out = Vec::with_capacity(arr.len());
            for item in arr {
                let s = item
                    .as_str()
                    .ok_or("must be array of strings")?
                    .trim()
                    .to_string();
                if !s.is_empty() {
                    out.push(s);
                }
            }
            Ok(Some(out))
        }
    }
}

pub fn engine_err(id: &str, e: EngineError) -> serde_json::Value {
    err(id, &e.code, e.message, e.details)
}

/// Optimistic persistence: the local mutation is already applied and is
/// never rolled back here. The returned report rides on the mutation's
/// response so the caller can show save state without a second request.
pub fn save_after_mutation(state: &mut AppState) -> serde_json::Value {
    let (remote, data) = match (state.remote.as_mut(), state.data.as_ref()) {
        (Some(r), Some(d)) => (r, d),
        _ => return json!({ "attempted": false }),
    };
    match remote.push(data) {
        Ok(version) => json!({ "attempted": true, "ok": true, "version": version }),
        Err(e) => {
            tracing::warn!(
                "save failed after mutation, local state kept: {} ({})",
                e.message,
                e.code
            );
            json!({ "attempted": true, "ok": false, "code": e.code, "message": e.message })
        }
    }
}

pub fn collection_counts(data: &Dataset) -> serde_json::Value {
    json!({
        "users": data.users.len(),
        "students": data.students.len(),
        "courses": data.courses.len(),
        "enrollments": data.enrollments.len(),
        "gradeEntries": data.grade_entries.len(),
        "trimesterLocks": data.trimester_locks.len(),
    })
}
