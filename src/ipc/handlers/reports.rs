use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::locks;
use crate::report;

/// Full report card model for one student: the student record, the
/// per-subject rows, and the lock state the UI needs to offer editing.
/// Never mutates the dataset and never triggers a save.
fn handle_boleta(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let student = match data.student(&student_id) {
        Some(s) => s,
        None => {
            return err(
                &req.id,
                "not_found",
                format!("unknown student: {}", student_id),
                None,
            )
        }
    };
    let rows = report::compile_report(data, &student_id);
    let status = locks::status(data, &student_id);
    ok(
        &req.id,
        json!({
            "student": student,
            "rows": rows,
            "locks": { "1": status[0], "2": status[1], "3": status[2] },
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.boleta" => Some(handle_boleta(state, req)),
        _ => None,
    }
}
