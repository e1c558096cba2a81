mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, sign_in, sign_up, spawn_sidecar, temp_dir};

fn setup(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    workspace: &std::path::Path,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let teacher = sign_up(
        stdin,
        reader,
        "s2",
        "teacher@school.test",
        "password1",
        "Tayo Teacher",
        "teacher",
    );
    let _admin = sign_up(
        stdin,
        reader,
        "s3",
        "admin@school.test",
        "password2",
        "Ada Admin",
        "admin",
    );
    let class = request_ok(
        stdin,
        reader,
        "s4",
        "classes.create",
        json!({
            "name": "Grade 10A",
            "gradeLevel": 10,
            "academicYear": "2025/2026",
            "teacherId": teacher,
            "maxStudents": 30
        }),
    );
    let class_id = class
        .get("class")
        .and_then(|c| c.get("id"))
        .and_then(|v| v.as_str())
        .expect("class id")
        .to_string();
    let student = request_ok(
        stdin,
        reader,
        "s5",
        "students.create",
        json!({
            "fullName": "Alice Ngozi",
            "email": "alice@school.test",
            "studentId": "STU-001",
            "classId": class_id,
            "parentName": "Mrs. Ngozi",
            "enrollmentDate": "2025-09-01"
        }),
    );
    student
        .get("student")
        .and_then(|s| s.get("userId"))
        .and_then(|v| v.as_str())
        .expect("student user id")
        .to_string()
}

#[test]
fn score_invariants_are_repository_preconditions() {
    let workspace = temp_dir("edumanager-performance-validation");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let student_user = setup(&mut stdin, &mut reader, &workspace);

    let _ = sign_in(
        &mut stdin,
        &mut reader,
        "1",
        "teacher@school.test",
        "password1",
    );

    // score > maxScore
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "performance.create",
        json!({
            "userId": student_user,
            "subject": "Mathematics",
            "grade": "A",
            "score": 55.0,
            "maxScore": 50.0
        }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&resp), "validation_failed");

    // maxScore must be positive
    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "performance.create",
        json!({
            "userId": student_user,
            "subject": "Mathematics",
            "grade": "A",
            "score": 0.0,
            "maxScore": 0.0
        }),
    );
    assert_eq!(error_code(&resp), "validation_failed");

    // Nothing was persisted by the rejected calls.
    let listed = request_ok(&mut stdin, &mut reader, "4", "performance.list", json!({}));
    assert_eq!(
        listed.get("performance").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "performance.create",
        json!({
            "userId": student_user,
            "subject": "Science",
            "grade": "B+",
            "score": 80.0,
            "maxScore": 100.0
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "performance.create",
        json!({
            "userId": student_user,
            "subject": "Mathematics",
            "grade": "A",
            "score": 45.0,
            "maxScore": 50.0
        }),
    );

    // mean(90, 80) = 85.0; the most recent insert carries the recent grade.
    let _ = sign_in(
        &mut stdin,
        &mut reader,
        "7",
        "alice@school.test",
        "temp123456",
    );
    let stats = request_ok(&mut stdin, &mut reader, "8", "performance.stats", json!({}));
    let s = stats.get("stats").expect("stats object");
    assert_eq!(s.get("averageScore").and_then(|v| v.as_f64()), Some(85.0));
    assert_eq!(s.get("totalRecords").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(s.get("recentGrade").and_then(|v| v.as_str()), Some("A"));

    let subjects = s
        .get("subjectStats")
        .and_then(|v| v.as_array())
        .expect("subject stats");
    assert_eq!(subjects.len(), 2);
    assert_eq!(
        subjects[0].get("subject").and_then(|v| v.as_str()),
        Some("Mathematics")
    );
    assert_eq!(subjects[0].get("average").and_then(|v| v.as_f64()), Some(90.0));
}

#[test]
fn students_cannot_record_and_teachers_are_class_scoped() {
    let workspace = temp_dir("edumanager-performance-gates");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let student_user = setup(&mut stdin, &mut reader, &workspace);

    // An unrelated teacher with no classes cannot record for this student.
    let _ = sign_up(
        &mut stdin,
        &mut reader,
        "1",
        "other@school.test",
        "password3",
        "Olu Other",
        "teacher",
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "performance.create",
        json!({
            "userId": student_user,
            "subject": "History",
            "grade": "C",
            "score": 10.0,
            "maxScore": 20.0
        }),
    );
    assert_eq!(error_code(&resp), "forbidden");

    let _ = sign_in(
        &mut stdin,
        &mut reader,
        "3",
        "alice@school.test",
        "temp123456",
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "performance.create",
        json!({
            "userId": student_user,
            "subject": "History",
            "grade": "A",
            "score": 20.0,
            "maxScore": 20.0
        }),
    );
    assert_eq!(error_code(&resp), "forbidden");
}
