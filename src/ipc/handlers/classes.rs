use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{
    get_nullable_str, get_opt_i64, get_opt_str, get_required_i64, get_required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::repo::{ClassPatch, NewClass};

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.classes.fetch(conn, &caller) {
        Ok(rows) => ok(&req.id, json!({ "classes": rows })),
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
    let grade_level = match get_required_i64(&req.params, "gradeLevel") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let academic_year = match get_required_str(&req.params, "academicYear") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let new = NewClass {
        name,
        grade_level,
        academic_year,
        teacher_id: get_opt_str(&req.params, "teacherId"),
        max_students: get_opt_i64(&req.params, "maxStudents").unwrap_or(30),
    };

    match state.repos.classes.create(conn, &caller, new) {
        Ok(row) => ok(&req.id, json!({ "class": row })),
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

    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let patch_params = req.params.get("patch").cloned().unwrap_or(json!({}));
    let patch = ClassPatch {
        name: get_opt_str(&patch_params, "name"),
        grade_level: get_opt_i64(&patch_params, "gradeLevel"),
        academic_year: get_opt_str(&patch_params, "academicYear"),
        teacher_id: get_nullable_str(&patch_params, "teacherId"),
        max_students: get_opt_i64(&patch_params, "maxStudents"),
    };

    match state.repos.classes.update(conn, &caller, &class_id, patch) {
        Ok(row) => ok(&req.id, json!({ "class": row })),
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

    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    match state.repos.classes.delete(conn, &caller, &class_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_list(state, req)),
        "classes.create" => Some(handle_create(state, req)),
        "classes.update" => Some(handle_update(state, req)),
        "classes.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
