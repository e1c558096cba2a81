mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, sign_up, spawn_sidecar, temp_dir};

#[test]
fn failed_updates_and_deletes_change_nothing() {
    let workspace = temp_dir("edumanager-failed-mutations");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(
        &mut stdin,
        &mut reader,
        "2",
        "admin@school.test",
        "password1",
        "Ada Admin",
        "admin",
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "fullName": "Alice Ngozi",
            "email": "alice@school.test",
            "studentId": "STU-001",
            "parentName": "Mrs. Ngozi",
            "enrollmentDate": "2025-09-01"
        }),
    );
    let student_row = created.get("student").cloned().expect("student");

    let before = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));

    // Updating an unknown id is an error and must not touch anything.
    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({ "id": "no-such-row", "patch": { "parentName": "Nobody" } }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&resp), "not_found");

    // Deleting an unknown id likewise.
    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.delete",
        json!({ "id": "no-such-row" }),
    );
    assert_eq!(error_code(&resp), "not_found");

    // An empty patch never reaches the store.
    let resp = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.update",
        json!({
            "id": student_row.get("id").and_then(|v| v.as_str()).unwrap(),
            "patch": {}
        }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    // A failed create (duplicate student code) leaves the roster length alone.
    let resp = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({
            "fullName": "Copy Cat",
            "email": "copy@school.test",
            "studentId": "STU-001",
            "parentName": "Mr. Cat",
            "enrollmentDate": "2025-09-01"
        }),
    );
    assert_eq!(error_code(&resp), "student_code_taken");

    let after = request_ok(&mut stdin, &mut reader, "9", "students.list", json!({}));
    assert_eq!(before, after);
}

#[test]
fn non_admins_cannot_mutate_rosters() {
    let workspace = temp_dir("edumanager-roster-gates");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(
        &mut stdin,
        &mut reader,
        "2",
        "teacher@school.test",
        "password1",
        "Tayo Teacher",
        "teacher",
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "fullName": "Alice Ngozi",
            "email": "alice@school.test",
            "studentId": "STU-001",
            "parentName": "Mrs. Ngozi",
            "enrollmentDate": "2025-09-01"
        }),
    );
    assert_eq!(error_code(&resp), "forbidden");

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({
            "name": "Grade 7A",
            "gradeLevel": 7,
            "academicYear": "2025/2026"
        }),
    );
    assert_eq!(error_code(&resp), "forbidden");

    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "subjects.create",
        json!({ "name": "Mathematics", "code": "MAT" }),
    );
    assert_eq!(error_code(&resp), "forbidden");
}
