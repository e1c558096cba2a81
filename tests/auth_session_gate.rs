mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, sign_up, spawn_sidecar, temp_dir};

#[test]
fn data_methods_require_a_session() {
    let workspace = temp_dir("edumanager-auth-gate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // No session yet: every data surface refuses before touching the store.
    for (i, method) in [
        "students.list",
        "classes.list",
        "attendance.list",
        "performance.list",
        "timetable.list",
        "settings.get",
        "assistant.logs",
        "payments.list",
    ]
    .iter()
    .enumerate()
    {
        let resp = request(&mut stdin, &mut reader, &format!("g{}", i), method, json!({}));
        assert_eq!(
            error_code(&resp),
            "not_authenticated",
            "{} must be gated",
            method
        );
    }

    let session = request_ok(&mut stdin, &mut reader, "2", "auth.session", json!({}));
    assert!(session.get("user").map(|u| u.is_null()).unwrap_or(false));

    let _ = sign_up(
        &mut stdin,
        &mut reader,
        "3",
        "someone@school.test",
        "password1",
        "Sam One",
        "student",
    );
    let session = request_ok(&mut stdin, &mut reader, "4", "auth.session", json!({}));
    assert_eq!(
        session
            .get("user")
            .and_then(|u| u.get("email"))
            .and_then(|v| v.as_str()),
        Some("someone@school.test")
    );

    // Signing out drops the session again.
    let _ = request_ok(&mut stdin, &mut reader, "5", "auth.signOut", json!({}));
    let resp = request(&mut stdin, &mut reader, "6", "students.list", json!({}));
    assert_eq!(error_code(&resp), "not_authenticated");
}

#[test]
fn credential_errors_are_uniform_and_emails_unique() {
    let workspace = temp_dir("edumanager-auth-errors");
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
        "someone@school.test",
        "password1",
        "Sam One",
        "student",
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.signIn",
        json!({ "email": "someone@school.test", "password": "wrong" }),
    );
    assert_eq!(error_code(&resp), "invalid_credentials");

    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "auth.signIn",
        json!({ "email": "nobody@school.test", "password": "password1" }),
    );
    assert_eq!(error_code(&resp), "invalid_credentials");

    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.signUp",
        json!({
            "email": "someone@school.test",
            "password": "password2",
            "fullName": "Sam Clone"
        }),
    );
    assert_eq!(error_code(&resp), "email_taken");

    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "auth.signUp",
        json!({
            "email": "short@school.test",
            "password": "tiny",
            "fullName": "Shorty"
        }),
    );
    assert_eq!(error_code(&resp), "validation_failed");
}
