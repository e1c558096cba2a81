mod test_support;

use serde_json::json;
use test_support::{request_ok, sign_in, sign_up, spawn_sidecar, temp_dir};

/// Temporary credential assigned to enrolled students.
const TEMP_PASSWORD: &str = "temp123456";

#[test]
fn fetch_applies_role_policy_per_caller() {
    let workspace = temp_dir("edumanager-role-rosters");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Accounts first; the last sign-up owns the session, so finish as admin.
    let teacher1 = sign_up(
        &mut stdin,
        &mut reader,
        "2",
        "t1@school.test",
        "password1",
        "Tayo One",
        "teacher",
    );
    let _teacher2 = sign_up(
        &mut stdin,
        &mut reader,
        "3",
        "t2@school.test",
        "password2",
        "Tunde Two",
        "teacher",
    );
    let _admin = sign_up(
        &mut stdin,
        &mut reader,
        "4",
        "admin@school.test",
        "password3",
        "Ada Admin",
        "admin",
    );

    let class_a = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.create",
        json!({
            "name": "Grade 7A",
            "gradeLevel": 7,
            "academicYear": "2025/2026",
            "teacherId": teacher1,
            "maxStudents": 30
        }),
    );
    let class_a_id = class_a
        .get("class")
        .and_then(|c| c.get("id"))
        .and_then(|v| v.as_str())
        .expect("class id")
        .to_string();

    // Second class has no teacher assigned at all.
    let class_b = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.create",
        json!({
            "name": "Grade 8B",
            "gradeLevel": 8,
            "academicYear": "2025/2026",
            "maxStudents": 25
        }),
    );
    let class_b_id = class_b
        .get("class")
        .and_then(|c| c.get("id"))
        .and_then(|v| v.as_str())
        .expect("class id")
        .to_string();

    let _alice = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({
            "fullName": "Alice Ngozi",
            "email": "alice@school.test",
            "studentId": "STU-001",
            "classId": class_a_id,
            "parentName": "Mrs. Ngozi",
            "enrollmentDate": "2025-09-01"
        }),
    );
    let _bob = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({
            "fullName": "Bob Sule",
            "email": "bob@school.test",
            "studentId": "STU-002",
            "classId": class_b_id,
            "parentName": "Mr. Sule",
            "enrollmentDate": "2025-09-01"
        }),
    );

    // Admin sees the full roster.
    let all = request_ok(&mut stdin, &mut reader, "9", "students.list", json!({}));
    assert_eq!(
        all.get("students").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    // Teacher with one class sees exactly that class's students.
    let _ = sign_in(&mut stdin, &mut reader, "10", "t1@school.test", "password1");
    let t1_view = request_ok(&mut stdin, &mut reader, "11", "students.list", json!({}));
    let t1_students = t1_view
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students array");
    assert_eq!(t1_students.len(), 1);
    assert_eq!(
        t1_students[0].get("studentId").and_then(|v| v.as_str()),
        Some("STU-001")
    );

    // A teacher with zero classes is a valid empty roster, not an error.
    let _ = sign_in(&mut stdin, &mut reader, "12", "t2@school.test", "password2");
    let t2_view = request_ok(&mut stdin, &mut reader, "13", "students.list", json!({}));
    assert_eq!(
        t2_view.get("students").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    // A student sees only their own record.
    let _ = sign_in(
        &mut stdin,
        &mut reader,
        "14",
        "alice@school.test",
        TEMP_PASSWORD,
    );
    let alice_view = request_ok(&mut stdin, &mut reader, "15", "students.list", json!({}));
    let alice_students = alice_view
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students array");
    assert_eq!(alice_students.len(), 1);
    assert_eq!(
        alice_students[0].get("studentId").and_then(|v| v.as_str()),
        Some("STU-001")
    );

    // Classes stay browsable for every role.
    let classes = request_ok(&mut stdin, &mut reader, "16", "classes.list", json!({}));
    assert_eq!(
        classes.get("classes").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );
}
