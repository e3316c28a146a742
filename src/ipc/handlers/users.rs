use crate::auth::{self, Permission, MIN_PASSWORD_LEN};
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{admin_write, authorize, conn, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::users::{self, Role};
use crate::validate::{Form, SHORT_TEXT};
use serde_json::json;
use tracing::info;

const ROLES: &str = "admin, moderator, visitor";

fn password_field(form: &mut Form<'_>, key: &str) -> String {
    let password = form.required_str(key, SHORT_TEXT);
    if !password.is_empty() && password.chars().count() < MIN_PASSWORD_LEN {
        form.error(key, format!("must be at least {MIN_PASSWORD_LEN} characters"));
    }
    password
}

fn list(state: &mut AppState, req: &Request) -> HandlerResult {
    if state.db.is_none() {
        return Ok(json!([]));
    }
    authorize(state, req, Permission::ManageUsers)?;
    let conn = conn(state)?;
    let rows = state.retry.run(|| users::list(conn))?;
    to_json(&rows)
}

fn create(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let username = form.required_str("username", SHORT_TEXT);
    let password = password_field(&mut form, "password");
    let role = form.required_choice("role", ROLES, Role::parse);
    form.finish()?;
    let role = role.unwrap_or(Role::Visitor);

    admin_write(state, req, Permission::ManageUsers, Invalidation::Nothing, |conn, actor| {
        let hash = auth::hash_password(&password).map_err(HandlerErr::internal)?;
        let id = users::create(conn, &username, &hash, role)?;
        info!(user_id = id, role = role.as_str(), by = actor.id, "user created");
        Ok(json!({ "id": id }))
    })
}

fn update_role(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let id = form.id("id");
    let role = form.required_choice("role", ROLES, Role::parse);
    form.finish()?;
    let role = role.unwrap_or(Role::Visitor);

    admin_write(state, req, Permission::ManageUsers, Invalidation::Nothing, |conn, actor| {
        users::set_role(conn, id, role)?;
        info!(user_id = id, role = role.as_str(), by = actor.id, "user role changed");
        Ok(json!({ "ok": true }))
    })
}

/// Existing sessions of the user end.
fn reset_password(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let id = form.id("id");
    let password = password_field(&mut form, "password");
    form.finish()?;

    admin_write(state, req, Permission::ManageUsers, Invalidation::Nothing, |conn, actor| {
        let hash = auth::hash_password(&password).map_err(HandlerErr::internal)?;
        users::set_password_hash(conn, id, &hash)?;
        info!(user_id = id, by = actor.id, "password reset");
        Ok(json!({ "ok": true }))
    })?;
    let keep = req.session.as_deref();
    state.sessions.revoke_user(id, keep);
    Ok(json!({ "ok": true }))
}

fn delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let id = form.id("id");
    form.finish()?;

    admin_write(state, req, Permission::ManageUsers, Invalidation::Nothing, |conn, actor| {
        users::delete(conn, id, actor.id)?;
        info!(user_id = id, by = actor.id, "user deleted");
        Ok(json!({ "ok": true }))
    })?;
    state.sessions.revoke_user(id, None);
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "users.list" => list(state, req),
        "users.create" => create(state, req),
        "users.updateRole" => update_role(state, req),
        "users.resetPassword" => reset_password(state, req),
        "users.delete" => delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
