use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_nullable_str, get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentStatus;
use crate::repo::{NewStudent, StudentPatch};

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.students.fetch(conn, &caller) {
        Ok(rows) => ok(&req.id, json!({ "students": rows })),
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

    let full_name = match get_required_str(&req.params, "fullName") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let email = match get_required_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let parent_name = match get_required_str(&req.params, "parentName") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let enrollment_date = match get_required_str(&req.params, "enrollmentDate") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    let new = NewStudent {
        full_name,
        email,
        student_id,
        class_id: get_opt_str(&req.params, "classId"),
        parent_name,
        parent_email: get_opt_str(&req.params, "parentEmail"),
        parent_phone: get_opt_str(&req.params, "parentPhone"),
        enrollment_date,
    };

    match state.repos.students.create(conn, &caller, new) {
        Ok(row) => ok(&req.id, json!({ "student": row })),
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
    let status = match patch_params.get("status").and_then(|v| v.as_str()) {
        None => None,
        Some(raw) => match StudentStatus::parse(raw) {
            Some(s) => Some(s),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "status must be active|inactive|graduated|transferred",
                    None,
                )
            }
        },
    };
    let patch = StudentPatch {
        student_id: get_opt_str(&patch_params, "studentId"),
        class_id: get_nullable_str(&patch_params, "classId"),
        parent_name: get_opt_str(&patch_params, "parentName"),
        parent_email: get_nullable_str(&patch_params, "parentEmail"),
        parent_phone: get_nullable_str(&patch_params, "parentPhone"),
        enrollment_date: get_opt_str(&patch_params, "enrollmentDate"),
        status,
    };

    match state.repos.students.update(conn, &caller, &id, patch) {
        Ok(row) => ok(&req.id, json!({ "student": row })),
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

    match state.repos.students.delete(conn, &caller, &id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.create" => Some(handle_create(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
