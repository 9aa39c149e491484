use serde_json::json;
use uuid::Uuid;

use crate::enroll;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::store::{Course, Dataset, Role};

fn teacher_name(data: &Dataset, course: &Course) -> Option<String> {
    course
        .teacher_id
        .as_deref()
        .and_then(|id| data.user(id))
        .map(|u| u.name.clone())
}

fn course_row(data: &Dataset, course: &Course) -> serde_json::Value {
    json!({
        "id": course.id,
        "subject": course.subject,
        "gradeLevel": course.grade_level,
        "section": course.section,
        "teacherId": course.teacher_id,
        "teacherName": teacher_name(data, course),
        "label": course.label(),
    })
}

/// A teacherId param must point at an existing profesor. `not_found` when
/// the user is missing, `bad_params` when it names a direccion account.
fn check_teacher(data: &Dataset, req: &Request, teacher_id: &str) -> Option<serde_json::Value> {
    match data.user(teacher_id) {
        None => Some(err(
            &req.id,
            "not_found",
            format!("unknown user: {}", teacher_id),
            None,
        )),
        Some(u) if u.role != Role::Profesor => Some(err(
            &req.id,
            "bad_params",
            format!("user {} is not a profesor", teacher_id),
            None,
        )),
        Some(_) => None,
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut filters: [Option<String>; 4] = [None, None, None, None];
    for (slot, key) in filters
        .iter_mut()
        .zip(["subject", "gradeLevel", "section", "teacherId"])
    {
        *slot = match helpers::parse_opt_string(req.params.get(key)) {
            Ok(v) => v,
            Err(msg) => return err(&req.id, "bad_params", format!("{}: {}", key, msg), None),
        };
    }
    let [subject, grade_level, section, teacher_id] = filters;
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let rows: Vec<serde_json::Value> = data
        .courses
        .iter()
        .filter(|c| subject.as_deref().map_or(true, |v| c.subject == v))
        .filter(|c| grade_level.as_deref().map_or(true, |v| c.grade_level == v))
        .filter(|c| section.as_deref().map_or(true, |v| c.section == v))
        .filter(|c| teacher_id.as_deref().map_or(true, |v| c.teacher_id.as_deref() == Some(v)))
        .map(|c| course_row(data, c))
        .collect();
    ok(&req.id, json!({ "courses": rows }))
}

/// The subject list of one section, as a boleta column header would show
/// it. Sorted by subject name since sections have no inherent order.
fn handle_for_section(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade_level = match helpers::required_str(req, "gradeLevel") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section = match helpers::required_str(req, "section") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let mut courses: Vec<&Course> = data
        .courses
        .iter()
        .filter(|c| c.grade_level == grade_level && c.section == section)
        .collect();
    courses.sort_by(|a, b| a.subject.cmp(&b.subject));
    let rows: Vec<serde_json::Value> = courses
        .iter()
        .map(|c| {
            json!({
                "courseId": c.id,
                "subject": c.subject,
                "teacherName": teacher_name(data, c),
            })
        })
        .collect();
    ok(&req.id, json!({ "courses": rows }))
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject = match helpers::required_str(req, "subject") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade_level = match helpers::required_str(req, "gradeLevel") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section = match helpers::required_str(req, "section") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match helpers::parse_opt_string(req.params.get("teacherId")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", format!("teacherId: {}", msg), None),
    };

    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    if let Some(tid) = teacher_id.as_deref() {
        if let Some(e) = check_teacher(data, req, tid) {
            return e;
        }
    }
    let course = Course {
        id: Uuid::new_v4().to_string(),
        subject,
        grade_level,
        section,
        teacher_id,
    };
    data.courses.push(course.clone());
    let row = course_row(data, &course);
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "course": row, "save": save }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match helpers::required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match req.params.get("patch").and_then(|v| v.as_object()) {
        Some(p) => p.clone(),
        None => return err(&req.id, "bad_params", "missing patch", None),
    };

    // Parse the whole patch before assigning anything; a rejected field
    // must leave the record as it was.
    let mut new_subject = None;
    let mut new_grade_level = None;
    let mut new_section = None;
    let mut new_teacher: Option<Option<String>> = None;
    for (key, value) in &patch {
        match key.as_str() {
            "subject" | "gradeLevel" | "section" => {
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
                    "subject" => new_subject = Some(s),
                    "gradeLevel" => new_grade_level = Some(s),
                    _ => new_section = Some(s),
                }
            }
            "teacherId" => {
                new_teacher = if value.is_null() {
                    Some(None)
                } else {
                    match value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                        Some(tid) => Some(Some(tid.to_string())),
                        None => {
                            return err(
                                &req.id,
                                "bad_params",
                                "patch.teacherId must be a string or null",
                                None,
                            )
                        }
                    }
                };
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
    let idx = match data.courses.iter().position(|c| c.id == course_id) {
        Some(i) => i,
        None => {
            return err(
                &req.id,
                "not_found",
                format!("unknown course: {}", course_id),
                None,
            )
        }
    };
    // Validate the teacher reference before touching the record.
    if let Some(Some(tid)) = new_teacher.as_ref() {
        if let Some(e) = check_teacher(data, req, tid) {
            return e;
        }
    }

    let course = &mut data.courses[idx];
    if let Some(v) = new_subject {
        course.subject = v;
    }
    if let Some(v) = new_grade_level {
        course.grade_level = v;
    }
    if let Some(v) = new_section {
        course.section = v;
    }
    if let Some(v) = new_teacher {
        course.teacher_id = v;
    }
    let course = course.clone();
    let row = course_row(data, &course);
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "course": row, "save": save }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match helpers::required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset_mut(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let removed = match enroll::delete_course(data, &course_id) {
        Ok(r) => r,
        Err(e) => return helpers::engine_err(&req.id, e),
    };
    tracing::info!(
        "course {} deleted ({} enrollments, {} grade entries)",
        course_id,
        removed.enrollments,
        removed.grade_entries
    );
    let save = helpers::save_after_mutation(state);
    ok(&req.id, json!({ "removed": removed, "save": save }))
}

fn handle_roster(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match helpers::required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let data = match helpers::dataset(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let course = match data.course(&course_id) {
        Some(c) => c,
        None => {
            return err(
                &req.id,
                "not_found",
                format!("unknown course: {}", course_id),
                None,
            )
        }
    };
    let mut students: Vec<_> = data
        .enrollments
        .iter()
        .filter(|e| e.course_id == course_id)
        .filter_map(|e| data.student(&e.student_id))
        .collect();
    students.sort_by(|a, b| a.name.cmp(&b.name));
    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| json!({ "id": s.id, "name": s.name, "ci": s.ci, "rude": s.rude }))
        .collect();
    ok(
        &req.id,
        json!({ "course": course_row(data, course), "students": rows }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_list(state, req)),
        "courses.forSection" => Some(handle_for_section(state, req)),
        "courses.create" => Some(handle_create(state, req)),
        "courses.update" => Some(handle_update(state, req)),
        "courses.delete" => Some(handle_delete(state, req)),
        "courses.roster" => Some(handle_roster(state, req)),
        _ => None,
    }
}
