use serde::Serialize;

use crate::store::{Dataset, EngineError, Enrollment};

/// Replaces the student's entire course selection. Duplicate ids collapse
/// to one enrollment; selection order is preserved. Nothing is mutated
/// unless the student and every course resolve.
pub fn set_enrollments(
    data: &mut Dataset,
    student_id: &str,
    course_ids: &[String],
) -> Result<usize, EngineError> {
    if data.student(student_id).is_none() {
        return Err(EngineError::new("not_found", "student not found"));
    }
    let missing: Vec<String> = course_ids
        .iter()
        .filter(|id| data.course(id).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(
            EngineError::new("not_found", "course not found")
                .with_details(serde_json::json!({ "courseIds": missing })),
        );
    }

    let mut selected: Vec<String> = Vec::with_capacity(course_ids.len());
    for id in course_ids {
        if !selected.contains(id) {
            selected.push(id.clone());
        }
    }

    data.enrollments.retain(|e| e.student_id != student_id);
    for course_id in &selected {
        data.enrollments.push(Enrollment {
            student_id: student_id.to_string(),
            course_id: course_id.clone(),
        });
    }
    Ok(selected.len())
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCascade {
    pub enrollments: usize,
    pub grade_entries: usize,
    pub trimester_locks: usize,
}

/// Removes the student and everything keyed on them: enrollments, grade
/// entries, and trimester-lock records.
pub fn delete_student(data: &mut Dataset, student_id: &str) -> Result<StudentCascade, EngineError> {
    if data.student(student_id).is_none() {
        return Err(EngineError::new("not_found", "student not found"));
    }
    data.students.retain(|s| s.id != student_id);

    let enrollments_before = data.enrollments.len();
    data.enrollments.retain(|e| e.student_id != student_id);
    let grades_before = data.grade_entries.len();
    data.grade_entries.retain(|e| e.student_id != student_id);
    let locks_before = data.trimester_locks.len();
    data.trimester_locks.retain(|l| l.student_id != student_id);

    Ok(StudentCascade {
        enrollments: enrollments_before - data.enrollments.len(),
        grade_entries: grades_before - data.grade_entries.len(),
        trimester_locks: locks_before - data.trimester_locks.len(),
    })
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCascade {
    pub enrollments: usize,
    pub grade_entries: usize,
}

/// Removes the course together with the enrollments and grade entries that
/// reference it, so no dangling course ids survive the deletion.
pub fn delete_course(data: &mut Dataset, course_id: &str) -> Result<CourseCascade, EngineError> {
    if data.course(course_id).is_none() {
        return Err(EngineError::new("not_found", "course not found"));
    }
    data.courses.retain(|c| c.id != course_id);

    let enrollments_before = data.enrollments.len();
    data.enrollments.retain(|e| e.course_id != course_id);
    let grades_before = data.grade_entries.len();
    data.grade_entries.retain(|e| e.course_id != course_id);

    Ok(CourseCascade {
        enrollments: enrollments_before - data.enrollments.len(),
        grade_entries: grades_before - data.grade_entries.len(),
    })
}
