use serde_json::json;

use crate::enroll;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let course_ids = data.enrolled_course_ids(&student_id);
    ok(&req.id, json!({ "courseIds": course_ids }))
}

fn handle_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_ids = match helpers::parse_opt_string_array(req.params.get("courseIds")) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing courseIds", None),
        Err(msg) => return err(&req.id, "bad_params", format!("courseIds: {}", msg), None),
    };
    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let count = match enroll::set_enrollments(data, &student_id, &course_ids) {
        Ok(n) => n,
        Err(e) => return helpers::engine_err(&req.id, e),
    };
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "count": count, "save": save }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.list" => Some(handle_list(state, req)),
        "enrollments.set" => Some(handle_set(state, req)),
        _ => None,
    }
}
