use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::locks;
use crate::store::{Dataset, EngineError, GradeEntry, GradeKind, SlotKey};

pub fn clamp_score(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

#[derive(Debug, Default)]
pub struct NormalizedEntries {
    /// Desired score per composite key, last occurrence wins.
    pub scores: BTreeMap<SlotKey, f64>,
    /// Entries dropped for a malformed trimester, kind, or slot. An empty
    /// or non-numeric score is not a drop; it marks the slot as empty.
    pub skipped: usize,
}

/// Boundary normalization for an upsert request. Scores are clamped to
/// [0,100]; an entry with an absent or non-numeric score is treated as
/// empty (the slot is simply not part of the desired set); entries with a
/// malformed trimester, kind, or slot are dropped and counted.
pub fn normalize_entries(raw: &[JsonValue]) -> NormalizedEntries {
    let mut out = NormalizedEntries::default();
    for item in raw {
        let trimester = item.get("trimester").and_then(|v| v.as_i64());
        let kind = item
            .get("kind")
            .and_then(|v| v.as_str())
            .and_then(GradeKind::parse);
        let slot = item.get("slot").and_then(|v| v.as_i64());
        let (Some(trimester), Some(kind), Some(slot)) = (trimester, kind, slot) else {
            out.skipped += 1;
            continue;
        };
        if !(1..=3).contains(&trimester) || !(1..=5).contains(&slot) {
            out.skipped += 1;
            continue;
        }
        let Some(score) = item.get("score").and_then(|v| v.as_f64()) else {
            // Empty slot: omitted from the desired set, not an error.
            continue;
        };
        let key = SlotKey {
            trimester: trimester as u8,
            kind,
            slot: slot as u8,
        };
        out.scores.insert(key, clamp_score(score));
    }
    out
}

/// Stored entries for one (student, course) pair, in composite-key order.
pub fn entries_for_pair(data: &Dataset, student_id: &str, course_id: &str) -> Vec<GradeEntry> {
    let mut entries: Vec<GradeEntry> = data
        .grade_entries
        .iter()
        .filter(|e| e.student_id == student_id && e.course_id == course_id)
        .cloned()
        .collect();
    entries.sort_by_key(|e| e.slot_key());
    entries
}

/// Full replace of the grade set for one (student, course) pair.
///
/// The trimester gate is enforced here, not by the caller: a locked
/// trimester's incoming subset must match what is already stored, slot for
/// slot and score for score. The grading form echoes stored values back for
/// locked trimesters, so that flow passes; any change, addition, or removal
/// under a locked trimester refuses the whole upsert before anything is
/// mutated.
///
/// Surrogate ids survive edits of the same composite key; new keys mint a
/// fresh id.
pub fn upsert_grades(
    data: &mut Dataset,
    student_id: &str,
    course_id: &str,
    scores: &BTreeMap<SlotKey, f64>,
) -> Result<Vec<GradeEntry>, EngineError> {
    if data.student(student_id).is_none() {
        return Err(EngineError::new("not_found", "student not found"));
    }
    if data.course(course_id).is_none() {
        return Err(EngineError::new("not_found", "course not found"));
    }

    let existing = entries_for_pair(data, student_id, course_id);

    for trimester in locks::TRIMESTERS {
        if locks::is_unlocked(data, student_id, trimester) {
            continue;
        }
        let stored: BTreeMap<SlotKey, f64> = existing
            .iter()
            .filter(|e| e.trimester == trimester)
            .map(|e| (e.slot_key(), e.score))
            .collect();
        let incoming: BTreeMap<SlotKey, f64> = scores
            .iter()
            .filter(|(k, _)| k.trimester == trimester)
            .map(|(k, v)| (*k, *v))
            .collect();
        if stored != incoming {
            return Err(EngineError::new(
                "trimester_locked",
                format!("trimester {} is locked for this student", trimester),
            )
            .with_details(serde_json::json!({ "trimester": trimester })));
        }
    }

    let prior_ids: BTreeMap<SlotKey, String> = existing
        .iter()
        .map(|e| (e.slot_key(), e.id.clone()))
        .collect();

    data.grade_entries
        .retain(|e| !(e.student_id == student_id && e.course_id == course_id));

    let mut stored = Vec::with_capacity(scores.len());
    for (key, score) in scores {
        let id = prior_ids
            .get(key)
            .cloned()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let entry = GradeEntry {
            id,
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            trimester: key.trimester,
            kind: key.kind,
            slot: key.slot,
            score: *score,
        };
        data.grade_entries.push(entry.clone());
        stored.push(entry);
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Course, Student};
    use serde_json::json;

    fn seeded() -> Dataset {
        let mut data = Dataset::default();
        data.students.push(Student {
            id: "a1".to_string(),
            name: "Ana Quispe".to_string(),
            ci: "7200311".to_string(),
            rude: "810042".to_string(),
            birth_date: None,
            nationality: String::new(),
            gender: String::new(),
            address: String::new(),
            phone: String::new(),
        });
        data.courses.push(Course {
            id: "c1".to_string(),
            subject: "Matemática".to_string(),
            grade_level: "Primero".to_string(),
            section: "A".to_string(),
            teacher_id: None,
        });
        data
    }

    fn unlock_all(data: &mut Dataset, student_id: &str) {
        for t in locks::TRIMESTERS {
            locks::toggle(data, student_id, t);
        }
    }

    fn entry(trimester: u8, kind: &str, slot: u8, score: f64) -> JsonValue {
        json!({ "trimester": trimester, "kind": kind, "slot": slot, "score": score })
    }

    #[test]
    fn normalize_clamps_scores_into_range() {
        let n = normalize_entries(&[entry(1, "practice", 1, 150.0), entry(1, "exam", 1, -5.0)]);
        assert_eq!(n.skipped, 0);
        let mut vals = n.scores.values();
        assert_eq!(vals.next().copied(), Some(100.0));
        assert_eq!(vals.next().copied(), Some(0.0));
    }

    #[test]
    fn normalize_treats_missing_score_as_empty_slot() {
        let n = normalize_entries(&[
            json!({ "trimester": 1, "kind": "practice", "slot": 1 }),
            json!({ "trimester": 1, "kind": "practice", "slot": 2, "score": null }),
            json!({ "trimester": 1, "kind": "practice", "slot": 3, "score": "85" }),
        ]);
        assert!(n.scores.is_empty());
        assert_eq!(n.skipped, 0, "empty slots are omissions, not drops");
    }

    #[test]
    fn normalize_drops_out_of_domain_keys() {
        let n = normalize_entries(&[
            entry(4, "practice", 1, 50.0),
            entry(1, "quiz", 1, 50.0),
            entry(1, "practice", 6, 50.0),
            json!({ "kind": "practice", "slot": 1, "score": 50.0 }),
        ]);
        assert!(n.scores.is_empty());
        assert_eq!(n.skipped, 4);
    }

    #[test]
    fn normalize_last_occurrence_wins() {
        let n = normalize_entries(&[entry(1, "exam", 2, 40.0), entry(1, "exam", 2, 90.0)]);
        assert_eq!(n.scores.len(), 1);
        assert_eq!(n.scores.values().next().copied(), Some(90.0));
    }

    #[test]
    fn upsert_is_a_full_replace_for_the_pair() {
        let mut data = seeded();
        unlock_all(&mut data, "a1");
        let first = normalize_entries(&[
            entry(1, "practice", 1, 80.0),
            entry(1, "practice", 2, 70.0),
            entry(1, "exam", 1, 90.0),
        ]);
        upsert_grades(&mut data, "a1", "c1", &first.scores).expect("first upsert");
        assert_eq!(entries_for_pair(&data, "a1", "c1").len(), 3);

        let second = normalize_entries(&[entry(1, "practice", 1, 85.0)]);
        let stored = upsert_grades(&mut data, "a1", "c1", &second.scores).expect("second upsert");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].score, 85.0);
        assert_eq!(entries_for_pair(&data, "a1", "c1").len(), 1);
    }

    #[test]
    fn upsert_reuses_surrogate_ids_per_slot() {
        let mut data = seeded();
        unlock_all(&mut data, "a1");
        let first = normalize_entries(&[entry(2, "exam", 3, 60.0)]);
        let before = upsert_grades(&mut data, "a1", "c1", &first.scores).expect("upsert");
        let second = normalize_entries(&[entry(2, "exam", 3, 95.0), entry(2, "exam", 4, 50.0)]);
        let after = upsert_grades(&mut data, "a1", "c1", &second.scores).expect("upsert");
        assert_eq!(after[0].id, before[0].id, "same slot keeps its id");
        assert_ne!(after[1].id, before[0].id);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut data = seeded();
        unlock_all(&mut data, "a1");
        let n = normalize_entries(&[entry(1, "practice", 1, 75.0), entry(3, "exam", 5, 55.0)]);
        let first = upsert_grades(&mut data, "a1", "c1", &n.scores).expect("upsert");
        let second = upsert_grades(&mut data, "a1", "c1", &n.scores).expect("upsert again");
        let first_ids: Vec<_> = first.iter().map(|e| e.id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|e| e.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(entries_for_pair(&data, "a1", "c1").len(), 2);
    }

    #[test]
    fn upsert_leaves_other_pairs_alone() {
        let mut data = seeded();
        data.courses.push(Course {
            id: "c2".to_string(),
            subject: "Física".to_string(),
            grade_level: "Primero".to_string(),
            section: "A".to_string(),
            teacher_id: None,
        });
        unlock_all(&mut data, "a1");
        let other = normalize_entries(&[entry(1, "exam", 1, 44.0)]);
        upsert_grades(&mut data, "a1", "c2", &other.scores).expect("seed other pair");

        let n = normalize_entries(&[entry(1, "exam", 1, 99.0)]);
        upsert_grades(&mut data, "a1", "c1", &n.scores).expect("upsert");
        let kept = entries_for_pair(&data, "a1", "c2");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 44.0);
    }

    #[test]
    fn upsert_rejects_unknown_ids() {
        let mut data = seeded();
        let n = normalize_entries(&[entry(1, "practice", 1, 10.0)]);
        let e = upsert_grades(&mut data, "ghost", "c1", &n.scores).expect_err("unknown student");
        assert_eq!(e.code, "not_found");
        let e = upsert_grades(&mut data, "a1", "ghost", &n.scores).expect_err("unknown course");
        assert_eq!(e.code, "not_found");
    }

    #[test]
    fn locked_trimester_refuses_changes() {
        let mut data = seeded();
        locks::toggle(&mut data, "a1", 1);
        let n = normalize_entries(&[entry(1, "practice", 1, 80.0)]);
        upsert_grades(&mut data, "a1", "c1", &n.scores).expect("unlocked write");
        locks::toggle(&mut data, "a1", 1);

        let changed = normalize_entries(&[entry(1, "practice", 1, 81.0)]);
        let e = upsert_grades(&mut data, "a1", "c1", &changed.scores).expect_err("locked change");
        assert_eq!(e.code, "trimester_locked");

        let added = normalize_entries(&[entry(1, "practice", 1, 80.0), entry(1, "exam", 1, 50.0)]);
        let e = upsert_grades(&mut data, "a1", "c1", &added.scores).expect_err("locked addition");
        assert_eq!(e.code, "trimester_locked");

        let omitted = normalize_entries(&[]);
        let e = upsert_grades(&mut data, "a1", "c1", &omitted.scores).expect_err("locked removal");
        assert_eq!(e.code, "trimester_locked");

        // Nothing mutated by the refused calls.
        let kept = entries_for_pair(&data, "a1", "c1");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 80.0);
    }

    #[test]
    fn locked_trimester_accepts_an_echo_of_stored_values() {
        let mut data = seeded();
        locks::toggle(&mut data, "a1", 1);
        let seed = normalize_entries(&[entry(1, "practice", 1, 80.0)]);
        upsert_grades(&mut data, "a1", "c1", &seed.scores).expect("seed");
        locks::toggle(&mut data, "a1", 1);
        locks::toggle(&mut data, "a1", 2);

        // The form sends back trimester 1 untouched while editing trimester 2.
        let echo = normalize_entries(&[entry(1, "practice", 1, 80.0), entry(2, "exam", 1, 65.0)]);
        let stored = upsert_grades(&mut data, "a1", "c1", &echo.scores).expect("echo flow");
        assert_eq!(stored.len(), 2);
    }
}
