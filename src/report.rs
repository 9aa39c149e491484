use serde::Serialize;

use crate::store::{Dataset, GradeEntry, GradeKind};

/// Final averages at or above this pass as "Aprobado".
const PASS_MARK: i64 = 51;

/// Round half up to the nearest integer. Scores are non-negative, so this
/// matches the rounding the boleta has always shown.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimesterDetail {
    pub practices: Vec<f64>,
    pub exams: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDetails {
    pub t1: TrimesterDetail,
    pub t2: TrimesterDetail,
    pub t3: TrimesterDetail,
}

/// One boleta line: a subject with its three trimester averages, the final
/// average, the pass/fail status, and the raw per-trimester score lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub subject: String,
    pub t1: Option<i64>,
    pub t2: Option<i64>,
    pub t3: Option<i64>,
    pub final_average: Option<i64>,
    pub status: String,
    pub per_trimester_detail: SubjectDetails,
}

fn status_label(final_average: Option<i64>) -> String {
    match final_average {
        None => String::new(),
        Some(avg) if avg >= PASS_MARK => "Aprobado".to_string(),
        Some(_) => "Reprobado".to_string(),
    }
}

fn trimester_slice(entries: &[&GradeEntry], trimester: u8) -> (TrimesterDetail, Option<i64>) {
    let mut relevant: Vec<&GradeEntry> = entries
        .iter()
        .filter(|e| e.trimester == trimester)
        .copied()
        .collect();
    relevant.sort_by_key(|e| e.slot);

    let practices: Vec<f64> = relevant
        .iter()
        .filter(|e| e.kind == GradeKind::Practice)
        .map(|e| e.score)
        .collect();
    let exams: Vec<f64> = relevant
        .iter()
        .filter(|e| e.kind == GradeKind::Exam)
        .map(|e| e.score)
        .collect();

    let average = if relevant.is_empty() {
        None
    } else {
        let sum: f64 = relevant.iter().map(|e| e.score).sum();
        Some(round_half_up(sum / relevant.len() as f64))
    };

    (TrimesterDetail { practices, exams }, average)
}

/// Compiles the boleta for one student. Read-only over the dataset and
/// deterministic: the same snapshot always yields the same rows.
///
/// Subjects come from the student's enrollments in first-seen order; a
/// subject backed by more than one course id (historical reassignment)
/// pools the entries of all of them. An unknown student, or one with no
/// enrollments, yields no rows.
pub fn compile_report(data: &Dataset, student_id: &str) -> Vec<SubjectRow> {
    let courses: Vec<_> = data
        .enrollments
        .iter()
        .filter(|e| e.student_id == student_id)
        .filter_map(|e| data.course(&e.course_id))
        .collect();

    let mut subjects: Vec<String> = Vec::new();
    for course in &courses {
        if !subjects.contains(&course.subject) {
            subjects.push(course.subject.clone());
        }
    }

    subjects
        .into_iter()
        .map(|subject| {
            let course_ids: Vec<&str> = courses
                .iter()
                .filter(|c| c.subject == subject)
                .map(|c| c.id.as_str())
                .collect();
            let entries: Vec<&GradeEntry> = data
                .grade_entries
                .iter()
                .filter(|e| e.student_id == student_id && course_ids.contains(&e.course_id.as_str()))
                .collect();

            let (d1, t1) = trimester_slice(&entries, 1);
            let (d2, t2) = trimester_slice(&entries, 2);
            let (d3, t3) = trimester_slice(&entries, 3);

            let valid: Vec<i64> = [t1, t2, t3].iter().flatten().copied().collect();
            let final_average = if valid.is_empty() {
                None
            } else {
                let sum: i64 = valid.iter().sum();
                Some(round_half_up(sum as f64 / valid.len() as f64))
            };

            SubjectRow {
                subject,
                t1,
                t2,
                t3,
                status: status_label(final_average),
                final_average,
                per_trimester_detail: SubjectDetails { t1: d1, t2: d2, t3: d3 },
            }
        })
        .collect()
}
