use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_opt_bool, get_opt_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Theme;
use crate::repo::SettingsPatch;

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.caller() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match state.repos.settings.fetch(conn, &caller) {
        Ok(row) => ok(&req.id, json!({ "settings": row })),
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

    let theme = match req.params.get("theme").and_then(|v| v.as_str()) {
        None => None,
        Some(raw) => match Theme::parse(raw) {
            Some(t) => Some(t),
            None => return err(&req.id, "bad_params", "theme must be light|dark|system", None),
        },
    };
    let patch = SettingsPatch {
        theme,
        notifications_enabled: get_opt_bool(&req.params, "notificationsEnabled"),
        language: get_opt_str(&req.params, "language"),
    };

    match state.repos.settings.update(conn, &caller, patch) {
        Ok(row) => ok(&req.id, json!({ "settings": row })),
        Err(e) => store_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_get(state, req)),
        "settings.update" => Some(handle_update(state, req)),
        _ => None,
    }
}
