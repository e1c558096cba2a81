mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, sign_up, spawn_sidecar, temp_dir};

#[test]
fn initialize_verify_and_list_round_trip() {
    let workspace = temp_dir("edumanager-payments");
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
        "payer@school.test",
        "password1",
        "Pat Payer",
        "admin",
    );

    let init = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "payments.initialize",
        json!({
            "amount": 25000.0,
            "currency": "ngn",
            "description": "First term tuition"
        }),
    );
    assert_eq!(init.get("status").and_then(|v| v.as_str()), Some("pending"));
    let tx_ref = init
        .get("txRef")
        .and_then(|v| v.as_str())
        .expect("txRef")
        .to_string();
    let link = init.get("link").and_then(|v| v.as_str()).expect("link");
    assert!(link.contains(&tx_ref));

    let verify = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "payments.verify",
        json!({ "txRef": tx_ref }),
    );
    assert_eq!(
        verify.get("status").and_then(|v| v.as_str()),
        Some("successful")
    );

    let listed = request_ok(&mut stdin, &mut reader, "5", "payments.list", json!({}));
    let payments = listed
        .get("payments")
        .and_then(|v| v.as_array())
        .expect("payments array");
    assert_eq!(payments.len(), 1);
    assert_eq!(
        payments[0].get("status").and_then(|v| v.as_str()),
        Some("successful")
    );
    // Fallback contact details come from the signed-in profile.
    assert_eq!(
        payments[0].get("email").and_then(|v| v.as_str()),
        Some("payer@school.test")
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "payments.verify",
        json!({ "txRef": "edumanager-unknown" }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let resp = request(
        &mut stdin,
        &mut reader,
        "7",
        "payments.initialize",
        json!({ "amount": -5.0, "currency": "NGN" }),
    );
    assert_eq!(error_code(&resp), "validation_failed");
}
