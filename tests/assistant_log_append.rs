mod test_support;

use serde_json::json;
use test_support::{request_ok, sign_up, spawn_sidecar, temp_dir};

#[test]
fn every_exchange_is_logged_newest_first() {
    let workspace = temp_dir("edumanager-assistant-logs");
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
        "asker@school.test",
        "password1",
        "Abby Asker",
        "student",
    );

    // Seed a little attendance so the canned branch has real numbers.
    for (i, (date, status)) in [
        ("2025-09-01", "present"),
        ("2025-09-02", "present"),
        ("2025-09-03", "present"),
        ("2025-09-04", "late"),
        ("2025-09-05", "absent"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "attendance.mark",
            json!({ "date": date, "status": status }),
        );
    }

    let asked = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assistant.ask",
        json!({ "prompt": "How is my attendance?" }),
    );
    let response = asked
        .get("response")
        .and_then(|v| v.as_str())
        .expect("response text");
    assert!(response.contains("80%"), "live rate expected: {}", response);
    assert_eq!(
        asked
            .get("log")
            .and_then(|l| l.get("prompt"))
            .and_then(|v| v.as_str()),
        Some("How is my attendance?")
    );

    let asked_again = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assistant.ask",
        json!({ "prompt": "what can you do, any help?" }),
    );
    assert!(asked_again
        .get("response")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .contains("attendance"));

    let logs = request_ok(&mut stdin, &mut reader, "5", "assistant.logs", json!({}));
    let entries = logs.get("logs").and_then(|v| v.as_array()).expect("logs");
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0].get("prompt").and_then(|v| v.as_str()),
        Some("what can you do, any help?")
    );
    assert_eq!(
        entries[1].get("prompt").and_then(|v| v.as_str()),
        Some("How is my attendance?")
    );
    // The stored response matches what was returned.
    assert_eq!(
        entries[1].get("response").and_then(|v| v.as_str()),
        Some(response)
    );
}
