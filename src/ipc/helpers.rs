//! Param extraction shared by the handler modules. Everything funnels into
//! `StoreError` with code `bad_params` so envelopes stay uniform.

use crate::repo::StoreError;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, StoreError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| StoreError::new("bad_params", format!("missing {}", key)))
}

/// Optional string; blank values collapse to None.
pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Distinguishes an absent key (None) from an explicit null (Some(None)), so
/// patches can clear nullable columns.
pub fn get_nullable_str(params: &serde_json::Value, key: &str) -> Option<Option<String>> {
    match params.get(key) {
        None => None,
        Some(v) if v.is_null() => Some(None),
        Some(v) => Some(v.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())),
    }
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, StoreError> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| StoreError::new("bad_params", format!("missing {}", key)))
}

pub fn get_opt_f64(params: &serde_json::Value, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, StoreError> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| StoreError::new("bad_params", format!("missing {}", key)))
}

pub fn get_opt_i64(params: &serde_json::Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn get_opt_bool(params: &serde_json::Value, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}
