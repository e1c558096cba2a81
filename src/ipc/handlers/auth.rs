use serde_json::json;

use crate::auth;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request, Session};
use crate::model::Role;

fn handle_sign_up(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match get_required_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let password = match get_required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let full_name = match get_required_str(&req.params, "fullName") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let role = match req.params.get("role").and_then(|v| v.as_str()) {
        None => Role::Student,
        Some(raw) => match Role::parse(raw) {
            Some(r) => r,
            None => return err(&req.id, "bad_params", "role must be admin|teacher|student", None),
        },
    };
    let phone = get_opt_str(&req.params, "phone");

    match auth::sign_up(
        conn,
        auth::SignUp {
            email,
            password,
            full_name,
            role,
            phone,
        },
    ) {
        Ok(user) => {
            let result = json!({ "user": &user });
            state.session = Some(Session { profile: user });
            state.repos.reset();
            ok(&req.id, result)
        }
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match get_required_str(&req.params, "email") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let password = match get_required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    match auth::sign_in(conn, &email, &password) {
        Ok(user) => {
            tracing::info!(role = user.role.as_str(), "sign-in for {}", user.email);
            let result = json!({ "user": &user });
            state.session = Some(Session { profile: user });
            state.repos.reset();
            ok(&req.id, result)
        }
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session = None;
    state.repos.reset();
    state.payments.reset();
    ok(&req.id, json!({ "ok": true }))
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(s) => ok(&req.id, json!({ "user": s.profile })),
        None => ok(&req.id, json!({ "user": null })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signUp" => Some(handle_sign_up(state, req)),
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        _ => None,
    }
}
