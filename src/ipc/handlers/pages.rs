use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages;
use crate::store::StoreResult;
use crate::validate::Form;

/// Serve `key` from the page cache, building and caching it on a miss.
fn serve(
    state: &mut AppState,
    page: &str,
    key: String,
    mut build: impl FnMut(&Connection) -> StoreResult<Value>,
) -> HandlerResult {
    let Some(conn) = state.db.as_ref() else {
        return Ok(pages::empty(page));
    };
    if let Some(model) = state.pages.get(&key) {
        debug!(key = %key, "page cache hit");
        return Ok(model);
    }
    let model = state.retry.run(|| build(conn))?;
    debug!(key = %key, "page built");
    state.pages.insert(key, model.clone());
    Ok(model)
}

fn page_number(req: &Request) -> Result<u32, crate::ipc::error::HandlerErr> {
    let mut form = Form::new(&req.params);
    let page = form.i64_or("page", 1);
    if page < 1 {
        form.error("page", "must be at least 1");
    }
    form.finish()?;
    Ok(u32::try_from(page).unwrap_or(1))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let cfg = state.config.pages.clone();
    let max_upload = state.config.uploads.max_bytes;
    let result = match req.method.as_str() {
        "pages.home" => serve(state, pages::HOME, pages::HOME.to_string(), |conn| {
            pages::home(conn, &cfg)
        }),
        "pages.notices" => page_number(req).and_then(|n| {
            serve(state, pages::NOTICES, pages::key(pages::NOTICES, n), |conn| {
                pages::notices(conn, &cfg, n)
            })
        }),
        "pages.notice" => id_param(req).and_then(|id| {
            serve(state, pages::NOTICE, pages::key(pages::NOTICE, id), |conn| {
                pages::notice(conn, id)
            })
        }),
        "pages.teachers" => serve(state, pages::TEACHERS, pages::TEACHERS.to_string(), pages::teachers),
        "pages.staff" => serve(state, pages::STAFF, pages::STAFF.to_string(), pages::staff),
        "pages.routines" => serve(state, pages::ROUTINES, pages::ROUTINES.to_string(), pages::routines),
        "pages.examRoutines" => serve(
            state,
            pages::EXAM_ROUTINES,
            pages::EXAM_ROUTINES.to_string(),
            pages::exam_routines,
        ),
        "pages.admission" => serve(state, pages::ADMISSION, pages::ADMISSION.to_string(), |conn| {
            pages::admission(conn, max_upload)
        }),
        "pages.gallery" => page_number(req).and_then(|n| {
            serve(state, pages::GALLERY, pages::key(pages::GALLERY, n), |conn| {
                pages::gallery(conn, &cfg, n)
            })
        }),
        "pages.videos" => serve(state, pages::VIDEOS, pages::VIDEOS.to_string(), pages::videos),
        "pages.about" => serve(state, pages::ABOUT, pages::ABOUT.to_string(), pages::about),
        _ => return None,
    };
    Some(respond(req, result))
}
