use serde_json::json;
use uuid::Uuid;

use crate::enroll;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::store::{Dataset, Student};

/// Case-insensitive on the name, verbatim substring on the CI.
fn matches_query(student: &Student, query: &str) -> bool {
    student.name.to_lowercase().contains(&query.to_lowercase()) || student.ci.contains(query)
}

fn parse_birth_date(v: Option<&serde_json::Value>) -> Result<Option<String>, String> {
    let raw = helpers::parse_opt_string(v).map_err(|m| m.to_string())?;
    match raw {
        None => Ok(None),
        Some(s) => match chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            Ok(_) => Ok(Some(s)),
            Err(_) => Err("must be a YYYY-MM-DD date".to_string()),
        },
    }
}

fn missing_course_ids(data: &Dataset, course_ids: &[String]) -> Vec<String> {
    course_ids
        .iter()
        .filter(|id| data.course(id).is_none())
        .cloned()
        .collect()
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let query = match helpers::parse_opt_string(req.params.get("query")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("query: {}", msg), None),
    };
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let students: Vec<&Student> = data
        .students
        .iter()
        .filter(|s| query.as_deref().map_or(true, |q| matches_query(s, q)))
        .collect();
    ok(&req.id, json!({ "students": students }))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let course_ids = data.enrolled_course_ids(&student_id);
    ok(&req.id, json!({ "student": student, "courseIds": course_ids }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match helpers::required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ci = match helpers::required_str(req, "ci") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rude = match helpers::required_str(req, "rude") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let birth_date = match parse_birth_date(req.params.get("birthDate")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("birthDate: {}", msg), None),
    };
    let mut extras = [String::new(), String::new(), String::new(), String::new()];
    for (slot, key) in extras
        .iter_mut()
        .zip(["nationality", "gender", "address", "phone"])
    {
        *slot = match helpers::parse_opt_string(req.params.get(key)) {
            Ok(v) => v.unwrap_or_default(),
            Err(msg) => return err(&req.id, "bad_params", format!("{}: {}", key, msg), None),
        };
    }
    let [nationality, gender, address, phone] = extras;
    let course_ids = match helpers::parse_opt_string_array(req.params.get("courseIds")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("courseIds: {}", msg), None),
    };

    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    // Check the enrollment targets before the student exists so a bad id
    // list leaves no half-created record behind.
    if let Some(ids) = course_ids.as_deref() {
        let missing = missing_course_ids(data, ids);
        if !missing.is_empty() {
            return err(
                &req.id,
                "not_found",
                "unknown courses in courseIds",
                Some(json!({ "courseIds": missing })),
            );
        }
    }

    let student = Student {
        id: Uuid::new_v4().to_string(),
        name,
        ci,
        rude,
        birth_date,
        nationality,
        gender,
        address,
        phone,
    };
    data.students.push(student.clone());
    let mut enrolled = 0usize;
    if let Some(ids) = course_ids.as_deref() {
        enrolled = match enroll::set_enrollments(data, &student.id, ids) {
            Ok(n) => n,
            Err(e) => return helpers::engine_err(&req.id, e),
        };
    }
    let save = helpers::save_after_mutation(state);
    ok(
        &req.id,
        json!({ "student": student, "enrolled": enrolled, "save": save }),
    )
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match req.params.get("patch") {
        None => serde_json::Map::new(),
        Some(v) if v.is_null() => serde_json::Map::new(),
        Some(v) => match v.as_object() {
            Some(p) => p.clone(),
            None => return err(&req.id, "bad_params", "patch must be an object", None),
        },
    };
    let course_ids = match helpers::parse_opt_string_array(req.params.get("courseIds")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("courseIds: {}", msg), None),
    };

    // Parse the whole patch before assigning anything; a rejected field
    // must leave the record as it was.
    let mut new_name = None;
    let mut new_ci = None;
    let mut new_rude = None;
    let mut new_birth_date: Option<Option<String>> = None;
    let mut new_nationality = None;
    let mut new_gender = None;
    let mut new_address = None;
    let mut new_phone = None;
    for (key, value) in &patch {
        match key.as_str() {
            "name" | "ci" | "rude" => {
                let s = match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                    Some(s) => s.to_string(),
                    None => {
                        return err(
                            &req.id,
                            "bad_params",
                            format!("patch.{} must be a non-empty string", key),
                            None,
                        )
                    }
                };
                match key.as_str() {
                    "name" => new_name = Some(s),
                    "ci" => new_ci = Some(s),
                    _ => new_rude = Some(s),
                }
            }
            "birthDate" => {
                new_birth_date = match parse_birth_date(Some(value)) {
                    Ok(v) => Some(v),
                    Err(msg) => {
                        return err(
                            &req.id,
                            "bad_params",
                            format!("patch.birthDate: {}", msg),
                            None,
                        )
                    }
                };
            }
            "nationality" | "gender" | "address" | "phone" => {
                let s = match helpers::parse_opt_string(Some(value)) {
                    Ok(v) => v.unwrap_or_default(),
                    Err(msg) => {
                        return err(
                            &req.id,
                            "bad_params",
                            format!("patch.{}: {}", key, msg),
                            None,
                        )
                    }
                };
                match key.as_str() {
                    "nationality" => new_nationality = Some(s),
                    "gender" => new_gender = Some(s),
                    "address" => new_address = Some(s),
                    _ => new_phone = Some(s),
                }
            }
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown patch field: {}", other),
                    None,
                )
            }
        }
    }

    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let idx = match data.students.iter().position(|s| s.id == student_id) {
        Some(i) => i,
        None => {
            return err(
                &req.id,
                "not_found",
                format!("unknown student: {}", student_id),
                None,
            )
        }
    };
    if let Some(ids) = course_ids.as_deref() {
        let missing = missing_course_ids(data, ids);
        if !missing.is_empty() {
            return err(
                &req.id,
                "not_found",
                "unknown courses in courseIds",
                Some(json!({ "courseIds": missing })),
            );
        }
    }

    let student = &mut data.students[idx];
    if let Some(v) = new_name {
        student.name = v;
    }
    if let Some(v) = new_ci {
        student.ci = v;
    }
    if let Some(v) = new_rude {
        student.rude = v;
    }
    if let Some(v) = new_birth_date {
        student.birth_date = v;
    }
    if let Some(v) = new_nationality {
        student.nationality = v;
    }
    if let Some(v) = new_gender {
        student.gender = v;
    }
    if let Some(v) = new_address {
        student.address = v;
    }
    if let Some(v) = new_phone {
        student.phone = v;
    }
    let student = student.clone();
    if let Some(ids) = course_ids.as_deref() {
        if let Err(e) = enroll::set_enrollments(data, &student_id, ids) {
            return helpers::engine_err(&req.id, e);
        }
    }
    let course_ids = data.enrolled_course_ids(&student_id);
    let save = helpers::save_after_mutation(state);
    ok(
        &req.id,
        json!({ "student": student, "courseIds": course_ids, "save": save }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match helpers::required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let removed = match enroll::delete_student(data, &student_id) {
        Ok(r) => r,
        Err(e) => return helpers::engine_err(&req.id, e),
    };
    tracing::info!(
        "student {} deleted ({} enrollments, {} grade entries)",
        student_id,
        removed.enrollments,
        removed.grade_entries
    );
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "removed": removed, "save": save }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.get" => Some(handle_get(state, req)),
        "students.create" => Some(handle_create(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
