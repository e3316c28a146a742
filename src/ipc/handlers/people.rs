use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::{self, Invalidation};
use crate::store::people::{self, StaffInput, TeacherInput};
use crate::validate::{FieldErrors, Form, IMAGE_MIMES, SHORT_TEXT};
use serde_json::json;
use tracing::info;

const TEACHER_PAGES: Invalidation = Invalidation::Prefixes(&[pages::TEACHERS]);
const STAFF_PAGES: Invalidation = Invalidation::Prefixes(&[pages::STAFF]);

fn teacher_input(state: &AppState, req: &Request) -> Result<TeacherInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let input = TeacherInput {
        name: form.required_str("name", SHORT_TEXT),
        designation: form.required_str("designation", SHORT_TEXT),
        subject: form.optional_str("subject", SHORT_TEXT),
        phone: form.optional_str("phone", 30),
        email: form.optional_str("email", SHORT_TEXT),
        joined_on: form.optional_date("joinedOn").map(|d| d.to_string()),
        photo: form.upload("photo", IMAGE_MIMES, state.config.uploads.max_bytes),
        sort_order: form.i64_or("sortOrder", 0),
    };
    if input.email.as_deref().is_some_and(|e| !e.contains('@')) {
        form.error("email", "must be an email address");
    }
    form.finish()?;
    Ok(input)
}

fn staff_input(state: &AppState, req: &Request) -> Result<StaffInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let input = StaffInput {
        name: form.required_str("name", SHORT_TEXT),
        designation: form.required_str("designation", SHORT_TEXT),
        phone: form.optional_str("phone", 30),
        photo: form.upload("photo", IMAGE_MIMES, state.config.uploads.max_bytes),
        sort_order: form.i64_or("sortOrder", 0),
    };
    form.finish()?;
    Ok(input)
}

fn teachers_list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), people::teachers_list)
}

fn teacher_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| people::teacher_get(conn, id).map(Some))
}

fn teacher_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = teacher_input(state, req)?;
    admin_write(state, req, Permission::ManageContent, TEACHER_PAGES, |conn, actor| {
        let id = people::teacher_create(conn, &input)?;
        info!(teacher_id = id, by = actor.id, "teacher created");
        Ok(json!({ "id": id }))
    })
}

fn teacher_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = teacher_input(state, req)?;
    admin_write(state, req, Permission::ManageContent, TEACHER_PAGES, |conn, actor| {
        people::teacher_update(conn, id, &input)?;
        info!(teacher_id = id, by = actor.id, "teacher updated");
        Ok(json!({ "ok": true }))
    })
}

fn teacher_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, TEACHER_PAGES, |conn, actor| {
        people::teacher_delete(conn, id)?;
        info!(teacher_id = id, by = actor.id, "teacher deleted");
        Ok(json!({ "ok": true }))
    })
}

fn staff_list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), people::staff_list)
}

fn staff_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| people::staff_get(conn, id).map(Some))
}

fn staff_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = staff_input(state, req)?;
    admin_write(state, req, Permission::ManageContent, STAFF_PAGES, |conn, actor| {
        let id = people::staff_create(conn, &input)?;
        info!(staff_id = id, by = actor.id, "staff member created");
        Ok(json!({ "id": id }))
    })
}

fn staff_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = staff_input(state, req)?;
    admin_write(state, req, Permission::ManageContent, STAFF_PAGES, |conn, actor| {
        people::staff_update(conn, id, &input)?;
        info!(staff_id = id, by = actor.id, "staff member updated");
        Ok(json!({ "ok": true }))
    })
}

fn staff_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageContent, STAFF_PAGES, |conn, actor| {
        people::staff_delete(conn, id)?;
        info!(staff_id = id, by = actor.id, "staff member deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "teachers.list" => teachers_list(state, req),
        "teachers.get" => teacher_get(state, req),
        "teachers.create" => teacher_create(state, req),
        "teachers.update" => teacher_update(state, req),
        "teachers.delete" => teacher_delete(state, req),
        "staff.list" => staff_list(state, req),
        "staff.get" => staff_get(state, req),
        "staff.create" => staff_create(state, req),
        "staff.update" => staff_update(state, req),
        "staff.delete" => staff_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
