//! Shared plumbing for handlers: response wrapping, session checks, and the
//! read/write wrappers that apply retries and page-cache invalidation.

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::auth::Permission;
use crate::ipc::error::{ok, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::users::{self, User};
use crate::store::{StoreError, StoreResult};
use crate::validate::Form;

pub fn respond(req: &Request, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(value) => ok(&req.id, value),
        Err(e) => e.response(&req.id),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(HandlerErr::internal)
}

pub fn conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(HandlerErr::no_database)
}

/// Resolve the session to a live user row and check the role.
///
/// The row is re-read on every call so deleted users and role changes take
/// effect immediately.
pub fn authorize(
    state: &mut AppState,
    req: &Request,
    permission: Permission,
) -> Result<User, HandlerErr> {
    let Some(token) = req.session.as_deref() else {
        return Err(HandlerErr::unauthorized());
    };
    let Some(user_id) = state.sessions.resolve(token) else {
        return Err(HandlerErr::unauthorized());
    };
    let user = match users::get(conn(state)?, user_id) {
        Ok(user) => user,
        Err(StoreError::NotFound { .. }) => {
            state.sessions.revoke(token);
            return Err(HandlerErr::unauthorized());
        }
        Err(e) => return Err(e.into()),
    };
    if !permission.granted_to(user.role) {
        debug!(user = %user.username, role = user.role.as_str(), ?permission, method = %req.method, "permission denied");
        return Err(HandlerErr::forbidden());
    }
    Ok(user)
}

/// Back-office read. Without a database the caller gets `empty`.
pub fn admin_read<T: Serialize>(
    state: &mut AppState,
    req: &Request,
    empty: T,
    mut op: impl FnMut(&Connection) -> StoreResult<T>,
) -> HandlerResult {
    if state.db.is_none() {
        return to_json(&empty);
    }
    authorize(state, req, Permission::ReadRecords)?;
    let conn = conn(state)?;
    let value = state.retry.run(|| op(conn))?;
    to_json(&value)
}

/// Public read. Without a database the caller gets `empty`.
pub fn public_read<T: Serialize>(
    state: &AppState,
    empty: T,
    mut op: impl FnMut(&Connection) -> StoreResult<T>,
) -> HandlerResult {
    let Some(conn) = state.db.as_ref() else {
        return to_json(&empty);
    };
    let value = state.retry.run(|| op(conn))?;
    to_json(&value)
}

/// Back-office write: database required, session and role checked, pages
/// made stale on success.
pub fn admin_write(
    state: &mut AppState,
    req: &Request,
    permission: Permission,
    invalidation: Invalidation,
    op: impl FnOnce(&Connection, &User) -> HandlerResult,
) -> HandlerResult {
    conn(state)?;
    let user = authorize(state, req, permission)?;
    let value = op(conn(state)?, &user)?;
    state.pages.apply(invalidation);
    Ok(value)
}

/// Public form submission: database required, no session.
pub fn public_write(
    state: &mut AppState,
    invalidation: Invalidation,
    op: impl FnOnce(&Connection) -> HandlerResult,
) -> HandlerResult {
    let value = op(conn(state)?)?;
    state.pages.apply(invalidation);
    Ok(value)
}

/// The `id` param every get/update/delete takes.
pub fn id_param(req: &Request) -> Result<i64, HandlerErr> {
    let mut form = Form::new(&req.params);
    let id = form.id("id");
    form.finish()?;
    Ok(id)
}
