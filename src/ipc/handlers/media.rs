use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::{self, Invalidation};
use crate::store::{media, Page};
use crate::validate::{FieldErrors, Form, IMAGE_MIMES, SHORT_TEXT};
use serde_json::json;
use tracing::info;

// The home page shows the latest gallery images.
const GALLERY_PAGES: Invalidation = Invalidation::Prefixes(&[pages::GALLERY, pages::HOME]);
const VIDEO_PAGES: Invalidation = Invalidation::Prefixes(&[pages::VIDEOS]);

fn gallery_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let page = form.page(state.config.pages.page_size);
    form.finish()?;
    admin_read(state, req, Page::empty(page), |conn| media::gallery_list(conn, page))
}

fn gallery_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let caption = form.optional_str("caption", SHORT_TEXT).unwrap_or_default();
    let image = form.required_upload("image", IMAGE_MIMES, state.config.uploads.max_bytes);
    form.finish()?;
    let Some(image) = image else {
        return Err(FieldErrors::single("image", "is required").into());
    };

    admin_write(state, req, Permission::ManageContent, GALLERY_PAGES, |conn, actor| {
        let id = media::gallery_add(conn, &caption, &image)?;
        info!(gallery_image_id = id, bytes = image.bytes.len(), by = actor.id, "gallery image added");
        Ok(json!({ "id": id }))
    })
}

fn gallery_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, GALLERY_PAGES, |conn, actor| {
        media::gallery_delete(conn, id)?;
        info!(gallery_image_id = id, by = actor.id, "gallery image deleted");
        Ok(json!({ "ok": true }))
    })
}

fn videos_list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), media::videos_list)
}

fn video_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let title = form.required_str("title", SHORT_TEXT);
    let url = form.required_str("url", SHORT_TEXT);
    let sort_order = form.i64_or("sortOrder", 0);
    if !url.is_empty() && !(url.starts_with("https://") || url.starts_with("http://")) {
        form.error("url", "must be an http(s) link");
    }
    form.finish()?;

    admin_write(state, req, Permission::ManageContent, VIDEO_PAGES, |conn, actor| {
        let id = media::video_add(conn, &title, &url, sort_order)?;
        info!(video_id = id, embeddable = media::youtube_embed_url(&url).is_some(), by = actor.id, "video added");
        Ok(json!({ "id": id }))
    })
}

fn video_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, VIDEO_PAGES, |conn, actor| {
        media::video_delete(conn, id)?;
        info!(video_id = id, by = actor.id, "video deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "gallery.list" => gallery_list(state, req),
        "gallery.add" => gallery_add(state, req),
        "gallery.delete" => gallery_delete(state, req),
        "videos.list" => videos_list(state, req),
        "videos.add" => video_add(state, req),
        "videos.delete" => video_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
