mod test_support;

use serde_json::json;
use test_support::{request_ok, sign_in, sign_up, spawn_sidecar, temp_dir};

#[test]
fn workspace_bundle_round_trips_into_a_fresh_workspace() {
    let workspace = temp_dir("edumanager-backup-src");
    let restored = temp_dir("edumanager-backup-dst");
    let bundle = workspace.join("backup.emgrbackup.zip");
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
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({
            "name": "Grade 7A",
            "gradeLevel": 7,
            "academicYear": "2025/2026"
        }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("edumanager-workspace-v1")
    );
    assert!(bundle.is_file());

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backup.importWorkspaceBundle",
        json!({
            "workspacePath": restored.to_string_lossy(),
            "inPath": bundle.to_string_lossy()
        }),
    );
    assert_eq!(
        imported.get("bundleFormatDetected").and_then(|v| v.as_str()),
        Some("edumanager-workspace-v1")
    );

    // The restored workspace carries the accounts and rows of the original.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.select",
        json!({ "path": restored.to_string_lossy() }),
    );
    let _ = sign_in(
        &mut stdin,
        &mut reader,
        "7",
        "admin@school.test",
        "password1",
    );
    let classes = request_ok(&mut stdin, &mut reader, "8", "classes.list", json!({}));
    let rows = classes
        .get("classes")
        .and_then(|v| v.as_array())
        .expect("classes array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name").and_then(|v| v.as_str()), Some("Grade 7A"));

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(restored);
}
