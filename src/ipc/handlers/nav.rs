use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::nav_links::{self, NavLinkInput};
use crate::validate::{FieldErrors, Form, SHORT_TEXT};
use serde_json::json;
use tracing::info;

fn input(req: &Request) -> Result<NavLinkInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let input = NavLinkInput {
        title: form.required_str("title", 100),
        href: form.optional_str("href", SHORT_TEXT),
        parent_id: form.optional_id("parentId"),
        sort_order: form.i64_or("sortOrder", 0),
        icon: form.optional_str("icon", 50),
    };
    form.finish()?;
    Ok(input)
}

/// Public menu. A failed fetch renders as an empty menu rather than an error.
fn tree(state: &mut AppState) -> HandlerResult {
    match state.db.as_ref() {
        Some(conn) => to_json(&nav_links::tree(conn)),
        None => Ok(json!([])),
    }
}

fn list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), nav_links::list)
}

fn get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| nav_links::get(conn, id).map(Some))
}

fn create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = input(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        let id = nav_links::create(conn, &input)?;
        info!(nav_link_id = id, parent_id = ?input.parent_id, by = actor.id, "nav link created");
        Ok(json!({ "id": id }))
    })
}

fn update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = input(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        nav_links::update(conn, id, &input)?;
        info!(nav_link_id = id, parent_id = ?input.parent_id, by = actor.id, "nav link updated");
        Ok(json!({ "ok": true }))
    })
}

fn delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        nav_links::delete(conn, id)?;
        info!(nav_link_id = id, by = actor.id, "nav link deleted with its children");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "nav.tree" => tree(state),
        "nav.list" => list(state, req),
        "nav.get" => get(state, req),
        "nav.create" => create(state, req),
        "nav.update" => update(state, req),
        "nav.delete" => delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
