mod test_support;

use serde_json::json;
use test_support::{request_ok, sign_up, spawn_sidecar, temp_dir};

#[test]
fn settings_upsert_keeps_a_single_row_per_user() {
    let workspace = temp_dir("edumanager-settings-upsert");
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
        "pref@school.test",
        "password1",
        "Pia Prefs",
        "student",
    );

    // Nothing saved yet.
    let fetched = request_ok(&mut stdin, &mut reader, "3", "settings.get", json!({}));
    assert!(fetched.get("settings").map(|s| s.is_null()).unwrap_or(false));

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "settings.update",
        json!({ "theme": "dark" }),
    );
    let first_id = first
        .get("settings")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("settings id")
        .to_string();
    assert_eq!(
        first
            .get("settings")
            .and_then(|s| s.get("theme"))
            .and_then(|v| v.as_str()),
        Some("dark")
    );
    // Unset fields fall back to defaults on first write.
    assert_eq!(
        first
            .get("settings")
            .and_then(|s| s.get("notificationsEnabled"))
            .and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(
        first
            .get("settings")
            .and_then(|s| s.get("language"))
            .and_then(|v| v.as_str()),
        Some("en")
    );

    // A later partial update keeps the row (same id) and the other fields.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "settings.update",
        json!({ "notificationsEnabled": false, "language": "fr" }),
    );
    assert_eq!(
        second
            .get("settings")
            .and_then(|s| s.get("id"))
            .and_then(|v| v.as_str()),
        Some(first_id.as_str())
    );
    assert_eq!(
        second
            .get("settings")
            .and_then(|s| s.get("theme"))
            .and_then(|v| v.as_str()),
        Some("dark")
    );
    assert_eq!(
        second
            .get("settings")
            .and_then(|s| s.get("notificationsEnabled"))
            .and_then(|v| v.as_bool()),
        Some(false)
    );

    let fetched = request_ok(&mut stdin, &mut reader, "6", "settings.get", json!({}));
    assert_eq!(
        fetched
            .get("settings")
            .and_then(|s| s.get("language"))
            .and_then(|v| v.as_str()),
        Some("fr")
    );
}
