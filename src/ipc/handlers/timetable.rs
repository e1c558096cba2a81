use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_nullable_str, get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::DayOfWeek;
use crate::repo::{CacheState, NewTimetableEntry, TimetableEntryPatch};
use crate::stats;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.timetable.fetch(conn, &caller) {
        Ok(rows) => ok(&req.id, json!({ "timetable": rows })),
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

    let subject = match get_required_str(&req.params, "subject") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let day_raw = match get_required_str(&req.params, "day") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let Some(day) = DayOfWeek::parse(&day_raw) else {
        return err(&req.id, "bad_params", "day must be Monday..Sunday", None);
    };
    let start_time = match get_required_str(&req.params, "startTime") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let end_time = match get_required_str(&req.params, "endTime") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    let new = NewTimetableEntry {
        // Entries default to the caller's own schedule.
        user_id: get_opt_str(&req.params, "userId").unwrap_or_else(|| caller.user_id.clone()),
        subject,
        subject_id: get_opt_str(&req.params, "subjectId"),
        day,
        start_time,
        end_time,
        location: get_opt_str(&req.params, "location").unwrap_or_default(),
        class_id: get_opt_str(&req.params, "classId"),
    };

    match state.repos.timetable.create(conn, &caller, new) {
        Ok(row) => ok(&req.id, json!({ "entry": row })),
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
    let day = match patch_params.get("day").and_then(|v| v.as_str()) {
        None => None,
        Some(raw) => match DayOfWeek::parse(raw) {
            Some(d) => Some(d),
            None => return err(&req.id, "bad_params", "day must be Monday..Sunday", None),
        },
    };
    let patch = TimetableEntryPatch {
        subject: get_opt_str(&patch_params, "subject"),
        subject_id: get_nullable_str(&patch_params, "subjectId"),
        day,
        start_time: get_opt_str(&patch_params, "startTime"),
        end_time: get_opt_str(&patch_params, "endTime"),
        location: get_opt_str(&patch_params, "location"),
        class_id: get_nullable_str(&patch_params, "classId"),
    };

    match state.repos.timetable.update(conn, &caller, &id, patch) {
        Ok(row) => ok(&req.id, json!({ "entry": row })),
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

    match state.repos.timetable.delete(conn, &caller, &id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_today(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let day_raw = match get_required_str(&req.params, "day") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let Some(day) = DayOfWeek::parse(&day_raw) else {
        return err(&req.id, "bad_params", "day must be Monday..Sunday", None);
    };

    if state.repos.timetable.cache_state() != CacheState::Ready {
        if let Err(e) = state.repos.timetable.fetch(conn, &caller) {
            return store_err(&req.id, e);
        }
    }
    ok(
        &req.id,
        json!({ "entries": stats::entries_for_day(state.repos.timetable.records(), day) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.list" => Some(handle_list(state, req)),
        "timetable.create" => Some(handle_create(state, req)),
        "timetable.update" => Some(handle_update(state, req)),
        "timetable.delete" => Some(handle_delete(state, req)),
        "timetable.today" => Some(handle_today(state, req)),
        _ => None,
    }
}
