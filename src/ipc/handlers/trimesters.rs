use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::locks;

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    if data.student(&student_id).is_none() {
        return err(
            &req.id,
            "not_found",
            format!("unknown student: {}", student_id),
            None,
        );
    }
    let status = locks::status(data, &student_id);
    ok(
        &req.id,
        json!({ "locks": { "1": status[0], "2": status[1], "3": status[2] } }),
    )
}

fn handle_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let trimester = match req.params.get("trimester").and_then(|v| v.as_u64()) {
        Some(t @ 1..=3) => t as u8,
        _ => return err(&req.id, "bad_params", "trimester must be 1, 2, or 3", None),
    };
    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    if data.student(&student_id).is_none() {
        return err(
            &req.id,
            "not_found",
            format!("unknown student: {}", student_id),
            None,
        );
    }
    let unlocked = locks::toggle(data, &student_id, trimester);
    tracing::info!(
        "trimester {} for student {} now {}",
        trimester,
        student_id,
        if unlocked { "unlocked" } else { "locked" }
    );
    let save = helpers::save_after_mutation(state);
    ok(
        &req.id,
        json!({ "trimester": trimester, "unlocked": unlocked, "save": save }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "trimesters.status" => Some(handle_status(state, req)),
        "trimesters.toggle" => Some(handle_toggle(state, req)),
        _ => None,
    }
}
