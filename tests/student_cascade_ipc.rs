use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_boletad");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn boletad");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "request {} failed: {}",
        id,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn seed_document() -> serde_json::Value {
    json!({
        "users": [],
        "students": [
            { "id": "s1", "name": "Ana Quispe", "ci": "7200311", "rude": "810042" },
            { "id": "s2", "name": "Bruno Mamani", "ci": "6100200", "rude": "810043" }
        ],
        "courses": [
            { "id": "c-mat", "subject": "Matemáticas", "gradeLevel": "Primero", "section": "A" },
            { "id": "c-len", "subject": "Lenguaje", "gradeLevel": "Primero", "section": "A" }
        ],
        "enrollments": [
            { "studentId": "s1", "courseId": "c-mat" },
            { "studentId": "s1", "courseId": "c-len" },
            { "studentId": "s2", "courseId": "c-mat" }
        ],
        "gradeEntries": [
            {
                "id": "g1", "studentId": "s1", "courseId": "c-mat",
                "trimester": 1, "kind": "practice", "slot": 1, "score": 80.0
            },
            {
                "id": "g2", "studentId": "s1", "courseId": "c-len",
                "trimester": 2, "kind": "exam", "slot": 1, "score": 66.0
            },
            {
                "id": "g3", "studentId": "s2", "courseId": "c-mat",
                "trimester": 1, "kind": "practice", "slot": 1, "score": 91.0
            }
        ],
        "trimesterLocks": [
            { "id": "l1", "studentId": "s1", "trimester": 1, "unlocked": true },
            { "id": "l2", "studentId": "s2", "trimester": 1, "unlocked": true }
        ]
    })
}

#[test]
fn deleting_a_student_removes_everything_keyed_on_them() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "store.open",
        json!({ "data": seed_document() }),
    );

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.delete",
        json!({ "studentId": "s1" }),
    );
    assert_eq!(
        deleted.pointer("/removed/enrollments").and_then(|v| v.as_u64()),
        Some(2)
    );
    assert_eq!(
        deleted.pointer("/removed/gradeEntries").and_then(|v| v.as_u64()),
        Some(2)
    );
    assert_eq!(
        deleted.pointer("/removed/trimesterLocks").and_then(|v| v.as_u64()),
        Some(1)
    );
    // No remote store attached, so nothing was pushed anywhere.
    assert_eq!(
        deleted.pointer("/save/attempted"),
        Some(&json!(false)),
        "{}",
        deleted
    );

    let gone = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.get",
        json!({ "studentId": "s1" }),
    );
    assert_eq!(
        gone.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );

    // The second student's records are untouched.
    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.sheet",
        json!({ "studentId": "s2", "courseId": "c-mat" }),
    );
    assert_eq!(
        sheet
            .get("entries")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(1)
    );
    assert_eq!(sheet.pointer("/locks/1"), Some(&json!(true)));

    let doc = request_ok(&mut stdin, &mut reader, "5", "store.get", json!({}));
    assert_eq!(
        doc.pointer("/data/enrollments")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(1)
    );
    assert_eq!(
        doc.pointer("/data/trimesterLocks")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(1)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn deleting_an_unknown_student_changes_nothing() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "store.open",
        json!({ "data": seed_document() }),
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "2",
        "students.delete",
        json!({ "studentId": "ghost" }),
    );
    assert_eq!(
        missing.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );

    let doc = request_ok(&mut stdin, &mut reader, "3", "store.get", json!({}));
    assert_eq!(
        doc.pointer("/data/students")
            .and_then(|v| v.as_array())
            .map(|v| v.len()),
        Some(2)
    );

    drop(stdin);
    let _ = child.wait();
}
