use chrono::NaiveDate;
use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;
use crate::repo::CacheState;
use crate::stats;

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.attendance.fetch(conn, &caller) {
        Ok(rows) => ok(&req.id, json!({ "attendance": rows })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let date = match get_required_str(&req.params, "date") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let status_raw = match get_required_str(&req.params, "status") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let Some(status) = AttendanceStatus::parse(&status_raw) else {
        return err(
            &req.id,
            "bad_params",
            "status must be present|absent|late|excused",
            None,
        );
    };
    // Without an explicit target this marks the caller's own day.
    let student_user_id =
        get_opt_str(&req.params, "studentUserId").unwrap_or_else(|| caller.user_id.clone());
    let remarks = get_opt_str(&req.params, "remarks");

    match state.repos.attendance.mark_one(
        conn,
        &caller,
        &student_user_id,
        &date,
        status,
        remarks.as_deref(),
    ) {
        Ok(row) => ok(&req.id, json!({ "record": row })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_bulk_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let date = match get_required_str(&req.params, "date") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let Some(map) = req.params.get("statusByStudent").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing statusByStudent", None);
    };

    let mut statuses: Vec<(String, AttendanceStatus)> = Vec::with_capacity(map.len());
    for (student_user_id, value) in map {
        let Some(status) = value.as_str().and_then(AttendanceStatus::parse) else {
            return err(
                &req.id,
                "bad_params",
                format!("invalid status for {}", student_user_id),
                None,
            );
        };
        statuses.push((student_user_id.clone(), status));
    }

    match state
        .repos
        .attendance
        .mark_bulk(conn, &caller, &class_id, &date, &statuses)
    {
        Ok(applied) => ok(&req.id, json!({ "applied": applied })),
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

    let date = match get_required_str(&req.params, "date") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    // Derived query over the read model; only populate it when it has never
    // been loaded for this session.
    if state.repos.attendance.cache_state() != CacheState::Ready {
        if let Err(e) = state.repos.attendance.fetch(conn, &caller) {
            return store_err(&req.id, e);
        }
    }
    let records = state.repos.attendance.todays_attendance_for(&date);
    ok(&req.id, json!({ "records": records }))
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    if let Err(e) = state.repos.attendance.fetch(conn, &caller) {
        return store_err(&req.id, e);
    }
    ok(
        &req.id,
        json!({ "stats": stats::attendance_stats(state.repos.attendance.records()) }),
    )
}

fn handle_weekly_series(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let anchor_raw = match get_required_str(&req.params, "anchorDate") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let Ok(anchor) = NaiveDate::parse_from_str(anchor_raw.trim(), "%Y-%m-%d") else {
        return err(&req.id, "bad_params", "anchorDate must be YYYY-MM-DD", None);
    };

    if let Err(e) = state.repos.attendance.fetch(conn, &caller) {
        return store_err(&req.id, e);
    }
    ok(
        &req.id,
        json!({
            "series": stats::weekly_attendance_series(state.repos.attendance.records(), anchor)
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_list(state, req)),
        "attendance.mark" => Some(handle_mark(state, req)),
        "attendance.bulkMark" => Some(handle_bulk_mark(state, req)),
        "attendance.today" => Some(handle_today(state, req)),
        "attendance.stats" => Some(handle_stats(state, req)),
        "attendance.weeklySeries" => Some(handle_weekly_series(state, req)),
        _ => None,
    }
}
