use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::{self, Invalidation};
use crate::store::notices::{self, NoticeInput};
use crate::store::Page;
use crate::validate::{FieldErrors, Form, DOCUMENT_MIMES, LONG_TEXT, SHORT_TEXT};
use serde_json::json;
use tracing::info;

const NOTICE_PAGES: Invalidation = Invalidation::Prefixes(&[pages::NOTICE, pages::HOME]);

/// Marquee notices are part of every page's layout.
fn invalidation(marquee_before: bool, marquee_after: bool) -> Invalidation {
    if marquee_before || marquee_after {
        Invalidation::All
    } else {
        NOTICE_PAGES
    }
}

fn was_marquee(state: &AppState, id: i64) -> bool {
    state
        .db
        .as_ref()
        .and_then(|conn| notices::get(conn, id).ok())
        .is_some_and(|n| n.is_marquee)
}

fn parse_input(state: &AppState, req: &Request) -> Result<NoticeInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let published_on = form
        .optional_date("publishedOn")
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let input = NoticeInput {
        title: form.required_str("title", SHORT_TEXT),
        body: form.optional_str("body", LONG_TEXT).unwrap_or_default(),
        published_on: published_on.to_string(),
        is_marquee: form.bool_or("isMarquee", false),
        attachment: form.upload("attachment", DOCUMENT_MIMES, state.config.uploads.max_bytes),
        remove_attachment: form.bool_or("removeAttachment", false),
    };
    form.finish()?;
    Ok(input)
}

fn list(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let search = form.optional_str("search", SHORT_TEXT);
    let page = form.page(state.config.pages.page_size);
    form.finish()?;
    admin_read(state, req, Page::empty(page), |conn| {
        notices::list(conn, search.as_deref(), page)
    })
}

fn get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| notices::get(conn, id).map(Some))
}

fn create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = parse_input(state, req)?;
    let touches = invalidation(false, input.is_marquee);
    admin_write(state, req, Permission::ManageContent, touches, |conn, actor| {
        let id = notices::create(conn, &input)?;
        info!(notice_id = id, marquee = input.is_marquee, by = actor.id, "notice created");
        Ok(json!({ "id": id }))
    })
}

fn update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = parse_input(state, req)?;
    let touches = invalidation(was_marquee(state, id), input.is_marquee);
    admin_write(state, req, Permission::ManageContent, touches, |conn, actor| {
        notices::update(conn, id, &input)?;
        info!(notice_id = id, by = actor.id, "notice updated");
        Ok(json!({ "ok": true }))
    })
}

fn delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let touches = invalidation(was_marquee(state, id), false);
    admin_write(state, req, Permission::ManageContent, touches, |conn, actor| {
        notices::delete(conn, id)?;
        info!(notice_id = id, by = actor.id, "notice deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notices.list" => list(state, req),
        "notices.get" => get(state, req),
        "notices.create" => create(state, req),
        "notices.update" => update(state, req),
        "notices.delete" => delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
