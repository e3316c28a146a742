use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::{self, Invalidation};
use crate::store::students::{self, StudentFilter, StudentInput};
use crate::store::Page;
use crate::validate::{FieldErrors, Form, IMAGE_MIMES, LONG_TEXT, SHORT_TEXT};
use serde_json::json;
use tracing::info;

/// The admission page lists classes taken from the roster.
const TOUCHES: Invalidation = Invalidation::Prefixes(&[pages::ADMISSION]);

fn parse_input(state: &AppState, req: &Request) -> Result<StudentInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let input = StudentInput {
        name: form.required_str("name", SHORT_TEXT),
        class_name: form.required_str("className", 50),
        section: form.optional_str("section", 20).unwrap_or_default(),
        roll: form.required_i64("roll"),
        gender: form.optional_str("gender", 20),
        guardian_name: form.optional_str("guardianName", SHORT_TEXT),
        phone: form.optional_str("phone", 30),
        address: form.optional_str("address", LONG_TEXT),
        date_of_birth: form.optional_date("dateOfBirth").map(|d| d.to_string()),
        admission_year: form.optional_i64("admissionYear"),
        photo: form.upload("photo", IMAGE_MIMES, state.config.uploads.max_bytes),
    };
    if input.roll < 0 {
        form.error("roll", "must not be negative");
    }
    form.finish()?;
    Ok(input)
}

fn list(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let filter = StudentFilter {
        class_name: form.optional_str("className", 50),
        section: form.optional_str("section", 20),
        search: form.optional_str("search", SHORT_TEXT),
    };
    let page = form.page(state.config.pages.page_size);
    form.finish()?;
    admin_read(state, req, Page::empty(page), |conn| {
        students::list(conn, &filter, page)
    })
}

fn get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| students::get(conn, id).map(Some))
}

fn classes(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), students::classes)
}

fn create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = parse_input(state, req)?;
    admin_write(state, req, Permission::ManageRecords, TOUCHES, |conn, actor| {
        let id = students::create(conn, &input)?;
        info!(student_id = id, class = %input.class_name, roll = input.roll, by = actor.id, "student created");
        Ok(json!({ "id": id }))
    })
}

fn update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = parse_input(state, req)?;
    admin_write(state, req, Permission::ManageRecords, TOUCHES, |conn, actor| {
        students::update(conn, id, &input)?;
        info!(student_id = id, by = actor.id, "student updated");
        Ok(json!({ "ok": true }))
    })
}

/// Attendance and fee records of the student go with it.
fn delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageRecords, TOUCHES, |conn, actor| {
        students::delete(conn, id)?;
        info!(student_id = id, by = actor.id, "student deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => list(state, req),
        "students.get" => get(state, req),
        "students.classes" => classes(state, req),
        "students.create" => create(state, req),
        "students.update" => update(state, req),
        "students.delete" => delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
