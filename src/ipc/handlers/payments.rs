use serde_json::json;

use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{get_opt_str, get_required_f64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::payments::PaymentDescriptor;

fn handle_initialize(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let amount = match get_required_f64(&req.params, "amount") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let currency = match get_required_str(&req.params, "currency") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };
    let desc = PaymentDescriptor {
        amount,
        currency,
        email: get_opt_str(&req.params, "email").unwrap_or_else(|| session.profile.email.clone()),
        name: get_opt_str(&req.params, "name").unwrap_or_else(|| session.profile.full_name.clone()),
        description: get_opt_str(&req.params, "description").unwrap_or_default(),
    };

    match state.payments.initialize(desc) {
        Ok(attempt) => ok(
            &req.id,
            json!({ "status": attempt.status, "link": attempt.link, "txRef": attempt.tx_ref }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_verify(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.session.is_none() {
        return err(&req.id, "not_authenticated", "sign in first", None);
    }

    let tx_ref = match get_required_str(&req.params, "txRef") {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, e),
    };

    match state.payments.verify(&tx_ref) {
        Ok(attempt) => ok(
            &req.id,
            json!({ "status": attempt.status, "txRef": attempt.tx_ref }),
        ),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.session.is_none() {
        return err(&req.id, "not_authenticated", "sign in first", None);
    }
    ok(&req.id, json!({ "payments": state.payments.attempts() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "payments.initialize" => Some(handle_initialize(state, req)),
        "payments.verify" => Some(handle_verify(state, req)),
        "payments.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
