use serde_json::json;

use crate::assistant::{self, AssistantContext};
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::stats;

fn handle_ask(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let prompt = match get_required_str(&req.params, "prompt") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    if prompt.trim().is_empty() {
        return err(&req.id, "bad_params", "prompt must not be empty", None);
    }

    // Ground the canned branches in the caller's own scoped records.
    if let Err(e) = state.repos.attendance.fetch(conn, &caller) {
        return store_err(&req.id, e);
    }
    if let Err(e) = state.repos.performance.fetch(conn, &caller) {
        return store_err(&req.id, e);
    }
    if let Err(e) = state.repos.students.fetch(conn, &caller) {
        return store_err(&req.id, e);
    }
    if let Err(e) = state.repos.classes.fetch(conn, &caller) {
        return store_err(&req.id, e);
    }
    let attendance = stats::attendance_stats(state.repos.attendance.records());
    let performance = stats::performance_stats(state.repos.performance.records());
    let student_count = state.repos.students.records().len() as i64;
    let class_count = state.repos.classes.records().len() as i64;

    let ctx = AssistantContext {
        attendance,
        performance,
        student_count,
        class_count,
    };
    let response = assistant::respond(&prompt, &ctx);

    // Every exchange is logged, response included, before it is returned.
    match state
        .repos
        .assistant_logs
        .append(conn, &caller, &prompt, &response)
    {
        Ok(log) => ok(&req.id, json!({ "response": response, "log": log })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_logs(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.assistant_logs.fetch(conn, &caller) {
        Ok(rows) => ok(&req.id, json!({ "logs": rows })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assistant.ask" => Some(handle_ask(state, req)),
        "assistant.logs" => Some(handle_logs(state, req)),
        _ => None,
    }
}
