use crate::auth::{self, Permission, MIN_PASSWORD_LEN};
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{authorize, conn, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::store::users;
use crate::validate::{Form, SHORT_TEXT};
use serde_json::json;
use tracing::{debug, info};

fn login(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let username = form.required_str("username", SHORT_TEXT);
    let password = form.required_str("password", SHORT_TEXT);
    form.finish()?;

    let conn = conn(state)?;
    let user = state.retry.run(|| users::by_username(conn, &username))?;
    let Some(user) = user.filter(|u| auth::verify_password(&password, &u.password_hash)) else {
        debug!(username = %username, "login rejected");
        return Err(HandlerErr::new("invalid_credentials", "wrong username or password"));
    };
    users::touch_last_login(conn, user.id)?;
    let (token, expires_at) = state.sessions.issue(user.id);
    info!(user_id = user.id, username = %user.username, "signed in");
    Ok(json!({
        "session": token,
        "expiresAt": expires_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "user": to_json(&user)?,
    }))
}

fn logout(state: &mut AppState, req: &Request) -> HandlerResult {
    let revoked = req
        .session
        .as_deref()
        .map(|token| state.sessions.revoke(token))
        .unwrap_or(false);
    Ok(json!({ "signedOut": revoked }))
}

fn whoami(state: &mut AppState, req: &Request) -> HandlerResult {
    let user = authorize(state, req, Permission::ReadRecords)?;
    to_json(&user)
}

/// Other sessions of the user are revoked; the current one stays.
fn change_password(state: &mut AppState, req: &Request) -> HandlerResult {
    let user = authorize(state, req, Permission::ReadRecords)?;
    let mut form = Form::new(&req.params);
    let current = form.required_str("currentPassword", SHORT_TEXT);
    let new = form.required_str("newPassword", SHORT_TEXT);
    if !new.is_empty() && new.chars().count() < MIN_PASSWORD_LEN {
        form.error("newPassword", format!("must be at least {MIN_PASSWORD_LEN} characters"));
    }
    if !current.is_empty() && !auth::verify_password(&current, &user.password_hash) {
        form.error("currentPassword", "is incorrect");
    }
    form.finish()?;

    let hash = auth::hash_password(&new).map_err(HandlerErr::internal)?;
    users::set_password_hash(conn(state)?, user.id, &hash)?;
    state.sessions.revoke_user(user.id, req.session.as_deref());
    info!(user_id = user.id, "password changed");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => login(state, req),
        "auth.logout" => logout(state, req),
        "auth.whoami" => whoami(state, req),
        "auth.changePassword" => change_password(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
