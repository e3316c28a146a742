use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::{self, Invalidation};
use crate::store::routines::{self, ExamRoutineInput};
use crate::validate::{FieldErrors, Form, DOCUMENT_MIMES, SHORT_TEXT};
use chrono::Datelike;
use serde_json::json;
use tracing::info;

const ROUTINE_PAGES: Invalidation = Invalidation::Prefixes(&[pages::ROUTINES]);
const EXAM_PAGES: Invalidation = Invalidation::Prefixes(&[pages::EXAM_ROUTINES]);

fn list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), routines::list)
}

/// One routine per class; uploading for a class replaces its file.
fn upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let class_name = form.required_str("className", 50);
    let title = form
        .optional_str("title", SHORT_TEXT)
        .unwrap_or_else(|| format!("Class {class_name} routine"));
    let file = form.required_upload("file", DOCUMENT_MIMES, state.config.uploads.max_bytes);
    form.finish()?;
    let Some(file) = file else {
        return Err(FieldErrors::single("file", "is required").into());
    };

    admin_write(state, req, Permission::ManageContent, ROUTINE_PAGES, |conn, actor| {
        let id = routines::upsert(conn, &class_name, &title, &file)?;
        info!(routine_id = id, class = %class_name, by = actor.id, "class routine saved");
        Ok(json!({ "id": id }))
    })
}

fn delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, ROUTINE_PAGES, |conn, actor| {
        routines::delete(conn, id)?;
        info!(routine_id = id, by = actor.id, "class routine deleted");
        Ok(json!({ "ok": true }))
    })
}

fn exam_input(state: &AppState, req: &Request, file_required: bool) -> Result<ExamRoutineInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let max_bytes = state.config.uploads.max_bytes;
    let published_on = form
        .optional_date("publishedOn")
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let input = ExamRoutineInput {
        exam_name: form.required_str("examName", SHORT_TEXT),
        class_name: form.required_str("className", 50),
        year: form.i64_or("year", i64::from(published_on.year())),
        published_on: published_on.to_string(),
        file: if file_required {
            form.required_upload("file", DOCUMENT_MIMES, max_bytes)
        } else {
            form.upload("file", DOCUMENT_MIMES, max_bytes)
        },
    };
    if !(1900..=9999).contains(&input.year) {
        form.error("year", "must be a four-digit year");
    }
    form.finish()?;
    Ok(input)
}

fn exam_list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), routines::exam_list)
}

fn exam_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| routines::exam_get(conn, id).map(Some))
}

fn exam_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = exam_input(state, req, true)?;
    admin_write(state, req, Permission::ManageContent, EXAM_PAGES, |conn, actor| {
        let id = routines::exam_create(conn, &input)?;
        info!(exam_routine_id = id, exam = %input.exam_name, by = actor.id, "exam routine created");
        Ok(json!({ "id": id }))
    })
}

fn exam_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = exam_input(state, req, false)?;
    admin_write(state, req, Permission::ManageContent, EXAM_PAGES, |conn, actor| {
        routines::exam_update(conn, id, &input)?;
        info!(exam_routine_id = id, by = actor.id, "exam routine updated");
        Ok(json!({ "ok": true }))
    })
}

fn exam_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, EXAM_PAGES, |conn, actor| {
        routines::exam_delete(conn, id)?;
        info!(exam_routine_id = id, by = actor.id, "exam routine deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "routines.list" => list(state, req),
        "routines.upsert" => upsert(state, req),
        "routines.delete" => delete(state, req),
        "examRoutines.list" => exam_list(state, req),
        "examRoutines.get" => exam_get(state, req),
        "examRoutines.create" => exam_create(state, req),
        "examRoutines.update" => exam_update(state, req),
        "examRoutines.delete" => exam_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
