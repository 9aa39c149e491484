use serde::{Deserialize, Serialize};

/// Management roles. Students are not users; their records live in
/// `Dataset::students` and student login (out of scope here) keys on CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Direccion,
    Profesor,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "direccion" => Some(Role::Direccion),
            "profesor" => Some(Role::Profesor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub ci: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub ci: String,
    pub rude: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub subject: String,
    pub grade_level: String,
    pub section: String,
    /// None means unassigned. Cleared when the referenced profesor is
    /// deleted, so absence is the only "no teacher" state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
}

impl Course {
    /// Display label, e.g. "Primero A".
    pub fn label(&self) -> String {
        format!("{} {}", self.grade_level, self.section)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_id: String,
    pub course_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeKind {
    Practice,
    Exam,
}

impl GradeKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "practice" => Some(GradeKind::Practice),
            "exam" => Some(GradeKind::Exam),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GradeKind::Practice => "practice",
            GradeKind::Exam => "exam",
        }
    }
}

/// Composite business key of a grade entry within one (student, course)
/// pair. Uniqueness of (student, course, SlotKey) is the ledger invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotKey {
    pub trimester: u8,
    pub kind: GradeKind,
    pub slot: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub trimester: u8,
    pub kind: GradeKind,
    pub slot: u8,
    pub score: f64,
}

impl GradeEntry {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            trimester: self.trimester,
            kind: self.kind,
            slot: self.slot,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimesterLock {
    pub id: String,
    pub student_id: String,
    pub trimester: u8,
    pub unlocked: bool,
}

/// The whole academic dataset, exchanged with the external store as one
/// JSON document. Collections are plain Vecs: the dataset is small by
/// contract and every consistency rule lives in the managers, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub grade_entries: Vec<GradeEntry>,
    #[serde(default)]
    pub trimester_locks: Vec<TrimesterLock>,
}

impl Dataset {
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn enrolled_course_ids(&self, student_id: &str) -> Vec<String> {
        self.enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .map(|e| e.course_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl EngineError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
