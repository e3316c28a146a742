use crate::auth::Permission;
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{admin_read, admin_write, public_write, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::applications::{self, AdmissionInput, AdmitCardInput, Kind, Status, StipendInput};
use crate::store::{site, Page};
use crate::validate::{Form, IMAGE_MIMES, LONG_TEXT, SHORT_TEXT};
use serde_json::json;
use tracing::info;

const KINDS: &str = "admission, admitCard, stipend";
const STATUSES: &str = "pending, approved, rejected";

fn parse_kind(raw: &str) -> Option<Kind> {
    match raw {
        "admission" => Some(Kind::Admission),
        "admitCard" => Some(Kind::AdmitCard),
        "stipend" => Some(Kind::Stipend),
        _ => None,
    }
}

fn admission_submit(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let date_of_birth = form.date("dateOfBirth");
    let input = AdmissionInput {
        applicant_name: form.required_str("applicantName", SHORT_TEXT),
        guardian_name: form.required_str("guardianName", SHORT_TEXT),
        date_of_birth: date_of_birth.map(|d| d.to_string()).unwrap_or_default(),
        desired_class: form.required_str("desiredClass", 50),
        previous_school: form.optional_str("previousSchool", SHORT_TEXT),
        phone: form.required_str("phone", 30),
        address: form.optional_str("address", LONG_TEXT),
        photo: form.upload("photo", IMAGE_MIMES, state.config.uploads.max_bytes),
    };
    if date_of_birth.is_some_and(|d| d > chrono::Local::now().date_naive()) {
        form.error("dateOfBirth", "must not be in the future");
    }
    form.finish()?;

    public_write(state, Invalidation::Nothing, |conn| {
        if !site::admission_open(conn)? {
            return Err(HandlerErr::new("rejected", "admissions are closed"));
        }
        let id = applications::admission_submit(conn, &input)?;
        info!(application_id = id, class = %input.desired_class, "admission application received");
        Ok(json!({ "id": id, "status": Status::Pending }))
    })
}

fn admit_card_submit(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let input = AdmitCardInput {
        student_name: form.required_str("studentName", SHORT_TEXT),
        class_name: form.required_str("className", 50),
        roll: form.required_i64("roll"),
        exam_name: form.required_str("examName", SHORT_TEXT),
        phone: form.required_str("phone", 30),
    };
    form.finish()?;

    public_write(state, Invalidation::Nothing, |conn| {
        let id = applications::admit_card_submit(conn, &input)?;
        info!(application_id = id, class = %input.class_name, roll = input.roll, "admit card application received");
        Ok(json!({ "id": id, "status": Status::Pending }))
    })
}

fn stipend_submit(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let input = StipendInput {
        student_name: form.required_str("studentName", SHORT_TEXT),
        class_name: form.required_str("className", 50),
        roll: form.required_i64("roll"),
        guardian_income_cents: form.money("guardianIncome"),
        reason: form.required_str("reason", LONG_TEXT),
        phone: form.required_str("phone", 30),
    };
    form.finish()?;

    public_write(state, Invalidation::Nothing, |conn| {
        let id = applications::stipend_submit(conn, &input)?;
        info!(application_id = id, class = %input.class_name, roll = input.roll, "stipend application received");
        Ok(json!({ "id": id, "status": Status::Pending }))
    })
}

fn kind_and_id(req: &Request) -> Result<(Kind, i64), HandlerErr> {
    let mut form = Form::new(&req.params);
    let kind = form.required_choice("kind", KINDS, parse_kind);
    let id = form.id("id");
    form.finish()?;
    Ok((kind.unwrap_or(Kind::Admission), id))
}

fn list(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let kind = form.required_choice("kind", KINDS, parse_kind);
    let status = form.choice("status", STATUSES, Status::parse);
    let page = form.page(state.config.pages.page_size);
    form.finish()?;

    match kind.unwrap_or(Kind::Admission) {
        Kind::Admission => admin_read(state, req, Page::empty(page), |conn| {
            applications::admissions_list(conn, status, page)
        }),
        Kind::AdmitCard => admin_read(state, req, Page::empty(page), |conn| {
            applications::admit_cards_list(conn, status, page)
        }),
        Kind::Stipend => admin_read(state, req, Page::empty(page), |conn| {
            applications::stipends_list(conn, status, page)
        }),
    }
}

fn get(state: &mut AppState, req: &Request) -> HandlerResult {
    let (kind, id) = kind_and_id(req)?;
    match kind {
        Kind::Admission => admin_read(state, req, None, |conn| {
            applications::admission_get(conn, id).map(Some)
        }),
        Kind::AdmitCard => admin_read(state, req, None, |conn| {
            applications::admit_card_get(conn, id).map(Some)
        }),
        Kind::Stipend => admin_read(state, req, None, |conn| {
            applications::stipend_get(conn, id).map(Some)
        }),
    }
}

fn set_status(state: &mut AppState, req: &Request) -> HandlerResult {
    let (kind, id) = kind_and_id(req)?;
    let mut form = Form::new(&req.params);
    let status = form.required_choice("status", STATUSES, Status::parse);
    form.finish()?;
    let status = status.unwrap_or(Status::Pending);

    admin_write(state, req, Permission::ManageContent, Invalidation::Nothing, |conn, actor| {
        applications::set_status(conn, kind, id, status)?;
        info!(kind = kind.entity(), application_id = id, status = status.as_str(), by = actor.id, "application status changed");
        Ok(json!({ "ok": true }))
    })
}

fn delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let (kind, id) = kind_and_id(req)?;
    admin_write(state, req, Permission::ManageContent, Invalidation::Nothing, |conn, actor| {
        applications::delete(conn, kind, id)?;
        info!(kind = kind.entity(), application_id = id, by = actor.id, "application deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "admissions.submit" => admission_submit(state, req),
        "admitCards.submit" => admit_card_submit(state, req),
        "stipends.submit" => stipend_submit(state, req),
        "applications.list" => list(state, req),
        "applications.get" => get(state, req),
        "applications.setStatus" => set_status(state, req),
        "applications.delete" => delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
