use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::locks;
use crate::store::Dataset;

fn check_pair(
    data: &Dataset,
    req: &Request,
    student_id: &str,
    course_id: &str,
) -> Option<serde_json::Value> {
    if data.student(student_id).is_none() {
        return Some(err(
            &req.id,
            "not_found",
            format!("unknown student: {}", student_id),
            None,
        ));
    }
    if data.course(course_id).is_none() {
        return Some(err(
            &req.id,
            "not_found",
            format!("unknown course: {}", course_id),
            None,
        ));
    }
    None
}

fn locks_json(data: &Dataset, student_id: &str) -> serde_json::Value {
    let status = locks::status(data, student_id);
    json!({ "1": status[0], "2": status[1], "3": status[2] })
}

fn handle_sheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match helpers::required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    if let Some(e) = check_pair(data, req, &student_id, &course_id) {
        return e;
    }
    let entries = ledger::entries_for_pair(data, &student_id, &course_id);
    ok(
        &req.id,
        json!({ "entries": entries, "locks": locks_json(data, &student_id) }),
    )
}

/// Replaces the full grade sheet of one (student, course) pair. The incoming
/// list is normalized first; rejected rows are reported back as `skipped`
/// rather than failing the request.
fn handle_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match helpers::required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let raw = match req.params.get("entries").and_then(|v| v.as_array()) {
        Some(arr) => arr,
        None => return err(&req.id, "bad_params", "missing entries", None),
    };
    let normalized = ledger::normalize_entries(raw);
    if normalized.skipped > 0 {
        tracing::debug!(
            "grade upsert for {}/{}: {} malformed entries dropped",
            student_id,
            course_id,
            normalized.skipped
        );
    }

    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let stored = match ledger::upsert_grades(data, &student_id, &course_id, &normalized.scores) {
        Ok(entries) => entries,
        Err(e) => return helpers::engine_err(&req.id, e),
    };
    let save = helpers::save_after_mutation(state);
    ok(
        &req.id,
        json!({ "entries": stored, "skipped": normalized.skipped, "save": save }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.sheet" => Some(handle_sheet(state, req)),
        "grades.upsert" => Some(handle_upsert(state, req)),
        _ => None,
    }
}
