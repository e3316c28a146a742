use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, id_param, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::fees::{self, CollectionFilter, FeeCollectionInput, FeeTypeInput};
use crate::store::Page;
use crate::validate::{FieldErrors, Form, LONG_TEXT, SHORT_TEXT};
use serde_json::json;
use tracing::info;

fn type_input(req: &Request) -> Result<FeeTypeInput, FieldErrors> {
    let mut form = Form::new(&req.params);
    let input = FeeTypeInput {
        name: form.required_str("name", SHORT_TEXT),
        amount_cents: form.money("amount"),
        description: form.optional_str("description", LONG_TEXT),
    };
    form.finish()?;
    Ok(input)
}

fn collection_filter(form: &mut Form<'_>) -> CollectionFilter {
    let filter = CollectionFilter {
        student_id: form.optional_id("studentId"),
        fee_type_id: form.optional_id("feeTypeId"),
        from: form.optional_date("from").map(|d| d.to_string()),
        to: form.optional_date("to").map(|d| d.to_string()),
    };
    if let (Some(from), Some(to)) = (&filter.from, &filter.to) {
        if from > to {
            form.error("to", "must not be before from");
        }
    }
    filter
}

fn types_list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), fees::types_list)
}

fn type_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_read(state, req, None, |conn| fees::type_get(conn, id).map(Some))
}

fn type_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let input = type_input(req)?;
    admin_write(state, req, Permission::ManageRecords, Invalidation::Nothing, |conn, actor| {
        let id = fees::type_create(conn, &input)?;
        info!(fee_type_id = id, name = %input.name, by = actor.id, "fee type created");
        Ok(json!({ "id": id }))
    })
}

fn type_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    let input = type_input(req)?;
    admin_write(state, req, Permission::ManageRecords, Invalidation::Nothing, |conn, actor| {
        fees::type_update(conn, id, &input)?;
        info!(fee_type_id = id, by = actor.id, "fee type updated");
        Ok(json!({ "ok": true }))
    })
}

fn type_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageRecords, Invalidation::Nothing, |conn, actor| {
        fees::type_delete(conn, id)?;
        info!(fee_type_id = id, by = actor.id, "fee type deleted");
        Ok(json!({ "ok": true }))
    })
}

fn collections_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let filter = collection_filter(&mut form);
    let page = form.page(state.config.pages.page_size);
    form.finish()?;
    admin_read(state, req, Page::empty(page), |conn| {
        fees::collections_list(conn, &filter, page)
    })
}

fn collections_summary(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let filter = collection_filter(&mut form);
    form.finish()?;
    admin_read(state, req, Vec::new(), |conn| fees::totals(conn, &filter))
}

fn collection_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let paid_on = form
        .optional_date("paidOn")
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let input = FeeCollectionInput {
        student_id: form.id("studentId"),
        fee_type_id: form.id("feeTypeId"),
        amount_cents: form.optional_money("amount"),
        paid_on: paid_on.to_string(),
        note: form.optional_str("note", SHORT_TEXT),
    };
    form.finish()?;

    admin_write(state, req, Permission::ManageRecords, Invalidation::Nothing, |conn, actor| {
        let (id, receipt_no) = fees::collection_create(conn, &input)?;
        info!(
            collection_id = id,
            student_id = input.student_id,
            receipt = %receipt_no,
            by = actor.id,
            "fee collected"
        );
        Ok(json!({ "id": id, "receiptNo": receipt_no }))
    })
}

fn collection_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let id = id_param(req)?;
    admin_write(state, req, Permission::ManageRecords, Invalidation::Nothing, |conn, actor| {
        fees::collection_delete(conn, id)?;
        info!(collection_id = id, by = actor.id, "fee collection deleted");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "feeTypes.list" => types_list(state, req),
        "feeTypes.get" => type_get(state, req),
        "feeTypes.create" => type_create(state, req),
        "feeTypes.update" => type_update(state, req),
        "feeTypes.delete" => type_delete(state, req),
        "feeCollections.list" => collections_list(state, req),
        "feeCollections.summary" => collections_summary(state, req),
        "feeCollections.create" => collection_create(state, req),
        "feeCollections.delete" => collection_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
