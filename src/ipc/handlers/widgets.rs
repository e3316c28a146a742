use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::widgets::{self, WidgetInput, WidgetKind};
use crate::validate::{FieldErrors, Form, IMAGE_MIMES, LONG_TEXT, SHORT_TEXT};
use serde_json::json;
use tracing::info;

const KINDS: &str = "html, image, links";

fn widget_input(state: &AppState, req: &Request, creating: bool) -> Result<WidgetInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let kind = form.required_choice("kind", KINDS, WidgetKind::parse);
    let title = form.required_str("title", 100);
    let content = form.optional_str("content", LONG_TEXT).unwrap_or_default();
    let image = form.upload("image", IMAGE_MIMES, state.config.uploads.max_bytes);
    let sort_order = form.i64_or("sortOrder", 0);
    let is_active = form.bool_or("isActive", true);
    match kind {
        Some(WidgetKind::Image) if creating && image.is_none() && req.params.get("image").is_none() => {
            form.error("image", "is required for image widgets");
        }
        Some(WidgetKind::Html | WidgetKind::Links) if content.is_empty() => {
            form.error("content", "is required");
        }
        _ => {}
    }
    form.finish()?;
    Ok(WidgetInput {
        title,
        kind: kind.unwrap_or(WidgetKind::Html),
        content,
        image,
        sort_order,
        is_active,
    })
}

fn list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), |conn| widgets::list(conn, false))
}

fn get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| widgets::get(conn, id).map(Some))
}

fn create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = widget_input(state, req, true)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        let id = widgets::create(conn, &input)?;
        info!(widget_id = id, kind = input.kind.as_str(), by = actor.id, "widget created");
        Ok(json!({ "id": id }))
    })
}

fn update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = widget_input(state, req, false)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        widgets::update(conn, id, &input)?;
        info!(widget_id = id, by = actor.id, "widget updated");
        Ok(json!({ "ok": true }))
    })
}

fn delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        widgets::delete(conn, id)?;
        info!(widget_id = id, by = actor.id, "widget deleted");
        Ok(json!({ "ok": true }))
    })
}

fn groups_list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), widgets::link_groups)
}

fn group_fields(req: &Request) -> Result<(String, i64), FieldErrors> {
    let mut form = Form::new(&req.params);
    let title = form.required_str("title", 100);
    let sort_order = form.i64_or("sortOrder", 0);
    form.finish()?;
    Ok((title, sort_order))
}

fn group_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let (title, sort_order) = group_fields(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        let id = widgets::group_create(conn, &title, sort_order)?;
        info!(group_id = id, by = actor.id, "link group created");
        Ok(json!({ "id": id }))
    })
}

fn group_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let (title, sort_order) = group_fields(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        widgets::group_update(conn, id, &title, sort_order)?;
        info!(group_id = id, by = actor.id, "link group updated");
        Ok(json!({ "ok": true }))
    })
}

fn group_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        widgets::group_delete(conn, id)?;
        info!(group_id = id, by = actor.id, "link group deleted");
        Ok(json!({ "ok": true }))
    })
}

fn link_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let group_id = form.id("groupId");
    let title = form.required_str("title", SHORT_TEXT);
    let url = form.required_str("url", SHORT_TEXT);
    let sort_order = form.i64_or("sortOrder", 0);
    form.finish()?;

    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        let id = widgets::link_create(conn, group_id, &title, &url, sort_order)?;
        info!(link_id = id, group_id, by = actor.id, "important link created");
        Ok(json!({ "id": id }))
    })
}

fn link_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::All, |conn, actor| {
        widgets::link_delete(conn, id)?;
        info!(link_id = id, by = actor.id, "important link deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "widgets.list" => list(state, req),
        "widgets.get" => get(state, req),
        "widgets.create" => create(state, req),
        "widgets.update" => update(state, req),
        "widgets.delete" => delete(state, req),
        "linkGroups.list" => groups_list(state, req),
        "linkGroups.create" => group_create(state, req),
        "linkGroups.update" => group_update(state, req),
        "linkGroups.delete" => group_delete(state, req),
        "links.create" => link_create(state, req),
        "links.delete" => link_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
