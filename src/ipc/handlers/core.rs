use crate::auth::{self, MIN_PASSWORD_LEN};
use crate::db;
use crate::ipc::error::{err, ok, HandlerErr, HandlerResult};
use crate::ipc::helpers::{conn, respond};
use crate::ipc::types::{AppState, Request};
use crate::store::users::{self, Role};
use crate::validate::{Form, SHORT_TEXT};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "databasePath": state.db_path.as_ref().map(|p| p.to_string_lossy().to_string()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "validation_failed", "missing params.path", None);
    };

    match db::open_workspace(&path) {
        Ok((conn, db_path)) => {
            info!(path = %db_path.display(), "database attached");
            state.attach(conn, db_path.clone());
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "databasePath": db_path.to_string_lossy(),
                }),
            )
        }
        Err(e) => {
            error!(error = ?e, path = %path.display(), "failed to open workspace");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

fn setup_status(state: &AppState) -> HandlerResult {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "databaseAttached": false, "hasAdmin": false }));
    };
    let admins = state.retry.run(|| users::count_admins(conn))?;
    Ok(json!({ "databaseAttached": true, "hasAdmin": admins > 0 }))
}

/// Bootstrap: creates the first admin while no account exists at all.
fn setup_create_admin(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = conn(state)?;
    let mut form = Form::new(&req.params);
    let username = form.required_str("username", SHORT_TEXT);
    let password = form.required_str("password", SHORT_TEXT);
    if !password.is_empty() && password.chars().count() < MIN_PASSWORD_LEN {
        form.error("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
    }
    form.finish()?;

    if users::count(conn)? > 0 {
        return Err(HandlerErr::new("rejected", "an account already exists; sign in instead"));
    }
    let hash = auth::hash_password(&password).map_err(HandlerErr::internal)?;
    let id = users::create(conn, &username, &hash, Role::Admin)?;
    info!(user_id = id, username = %username, "first admin created");
    Ok(json!({ "id": id, "username": username, "role": Role::Admin }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "setup.status" => Some(respond(req, setup_status(state))),
        "setup.createAdmin" => Some(respond(req, setup_create_admin(state, req))),
        _ => None,
    }
}
