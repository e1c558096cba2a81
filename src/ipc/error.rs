use serde_json::json;

use crate::repo::StoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Store failures are caught, logged, and surfaced as error envelopes; they
/// never tear the request loop down.
pub fn store_err(id: &str, e: StoreError) -> serde_json::Value {
    tracing::warn!(code = %e.code, "store operation failed: {}", e.message);
    err(id, &e.code, e.message, e.details)
}
