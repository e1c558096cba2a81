use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::repo::{NewSubject, SubjectPatch};

fn grade_levels_from(params: &serde_json::Value, key: &str) -> Option<Vec<i64>> {
    params.get(key).and_then(|v| v.as_array()).map(|arr| {
        arr.iter().filter_map(|v| v.as_i64()).collect::<Vec<_>>()
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.subjects.fetch(conn, &caller) {
        Ok(rows) => ok(&req.id, json!({ "subjects": rows })),
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

    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let code = match get_required_str(&req.params, "code") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let new = NewSubject {
        name,
        code,
        description: get_opt_str(&req.params, "description").unwrap_or_default(),
        grade_levels: grade_levels_from(&req.params, "gradeLevels").unwrap_or_default(),
    };

    match state.repos.subjects.create(conn, &caller, new) {
        Ok(row) => ok(&req.id, json!({ "subject": row })),
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
    let patch = SubjectPatch {
        name: get_opt_str(&patch_params, "name"),
        code: get_opt_str(&patch_params, "code"),
        description: get_opt_str(&patch_params, "description"),
        grade_levels: grade_levels_from(&patch_params, "gradeLevels"),
    };

    match state.repos.subjects.update(conn, &caller, &id, patch) {
        Ok(row) => ok(&req.id, json!({ "subject": row })),
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

    match state.repos.subjects.delete(conn, &caller, &id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_list(state, req)),
        "subjects.create" => Some(handle_create(state, req)),
        "subjects.update" => Some(handle_update(state, req)),
        "subjects.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
