use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_opt_f64, get_opt_str, get_required_f64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::repo::{NewPerformanceRecord, PerformancePatch};
use crate::stats;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.performance.fetch(conn, &caller) {
        Ok(rows) => ok(&req.id, json!({ "performance": rows })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let user_id = match get_required_str(&req.params, "userId") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let subject = match get_required_str(&req.params, "subject") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let grade = match get_required_str(&req.params, "grade") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let score = match get_required_f64(&req.params, "score") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let max_score = match get_required_f64(&req.params, "maxScore") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    let new = NewPerformanceRecord {
        user_id,
        subject,
        subject_id: get_opt_str(&req.params, "subjectId"),
        grade,
        score,
        max_score,
        remarks: get_opt_str(&req.params, "remarks").unwrap_or_default(),
    };

    match state.repos.performance.create(conn, &caller, new) {
        Ok(row) => ok(&req.id, json!({ "record": row })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let id = match get_required_str(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let patch_params = req.params.get("patch").cloned().unwrap_or(json!({}));
    let patch = PerformancePatch {
        subject: get_opt_str(&patch_params, "subject"),
        grade: get_opt_str(&patch_params, "grade"),
        score: get_opt_f64(&patch_params, "score"),
        max_score: get_opt_f64(&patch_params, "maxScore"),
        remarks: get_opt_str(&patch_params, "remarks"),
    };

    match state.repos.performance.update(conn, &caller, &id, patch) {
        Ok(row) => ok(&req.id, json!({ "record": row })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let id = match get_required_str(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    match state.repos.performance.delete(conn, &caller, &id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    if let Err(e) = state.repos.performance.fetch(conn, &caller) {
        return store_err(&req.id, e);
    }
    ok(
        &req.id,
        json!({ "stats": stats::performance_stats(state.repos.performance.records()) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "performance.list" => Some(handle_list(state, req)),
        "performance.create" => Some(handle_create(state, req)),
        "performance.update" => Some(handle_update(state, req)),
        "performance.delete" => Some(handle_delete(state, req)),
        "performance.stats" => Some(handle_stats(state, req)),
        _ => None,
    }
}
