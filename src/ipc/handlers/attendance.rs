use std::collections::BTreeMap;

use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::attendance::{self, AttendanceEntry, AttendanceStatus, MonthSummary};
use crate::store::students;
use crate::validate::{FieldErrors, Form, SHORT_TEXT};
use serde_json::{json, Value};
use tracing::info;

/// Entries arrive either as `[{studentId, status, reason}]` or as a map keyed
/// by student id. Each bad entry gets its own field error. An empty list or
/// map is valid and saves nothing.
fn parse_entries(raw: Option<&Value>, errors: &mut FieldErrors) -> BTreeMap<i64, AttendanceEntry> {
    let mut out = BTreeMap::new();
    let items: Vec<(String, Option<i64>, &Value)> = match raw {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let id = item.get("studentId").and_then(Value::as_i64);
                (format!("entries[{i}]"), id, item)
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, item)| (format!("entries.{k}"), k.trim().parse::<i64>().ok(), item))
            .collect(),
        Some(Value::Null) | None => {
            errors.add("entries", "is required");
            return out;
        }
        Some(_) => {
            errors.add("entries", "must be a list or an object");
            return out;
        }
    };

    for (field, id, item) in items {
        let Some(id) = id.filter(|id| *id > 0) else {
            errors.add(&field, "student id must be a positive integer");
            continue;
        };
        let Some(status) = item
            .get("status")
            .and_then(Value::as_str)
            .and_then(AttendanceStatus::parse)
        else {
            errors.add(&field, "status must be Present or Absent");
            continue;
        };
        let reason = item
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string);
        if reason.as_deref().is_some_and(|r| r.chars().count() > SHORT_TEXT) {
            errors.add(&field, format!("reason must be at most {SHORT_TEXT} characters"));
            continue;
        }
        if out.insert(id, AttendanceEntry { status, reason }).is_some() {
            errors.add(&field, format!("student {id} appears more than once"));
        }
    }
    out
}

fn save(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let date = form.date("date");
    let mut entry_errors = FieldErrors::default();
    let entries = parse_entries(req.params.get("entries"), &mut entry_errors);
    for (field, messages) in entry_errors.0 {
        for message in messages {
            form.error(&field, message);
        }
    }
    form.finish()?;
    let Some(date) = date else {
        return Err(FieldErrors::single("date", "is required").into());
    };

    admin_write(state, req, Permission::ManageRecords, Invalidation::Nothing, |conn, actor| {
        let ids: Vec<i64> = entries.keys().copied().collect();
        let missing = students::missing_ids(conn, &ids)?;
        if !missing.is_empty() {
            let mut errors = FieldErrors::default();
            for id in &missing {
                errors.add("entries", format!("unknown student {id}"));
            }
            return Err(errors.into());
        }
        let written = attendance::save(conn, date, &entries)?;
        info!(date = %date, written, by = actor.id, "attendance recorded");
        let records = attendance::for_students(conn, date, &ids)?;
        Ok(json!({
            "date": attendance::date_key(date),
            "saved": written,
            "records": records,
        }))
    })
}

fn get(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let date = form.date("date");
    let class_name = form.required_str("className", 50);
    let section = form.optional_str("section", 20);
    form.finish()?;
    let Some(date) = date else {
        return Err(FieldErrors::single("date", "is required").into());
    };
    admin_read(state, req, Vec::new(), |conn| {
        attendance::for_class(conn, date, &class_name, section.as_deref())
    })
}

fn month_summary(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let month = form.month("month");
    let class_name = form.required_str("className", 50);
    let section = form.optional_str("section", 20);
    form.finish()?;
    let Some(month) = month else {
        return Err(FieldErrors::single("month", "is required").into());
    };
    let empty = MonthSummary {
        month: month.format("%Y-%m").to_string(),
        marked_days: 0,
        rows: Vec::new(),
    };
    admin_read(state, req, empty, |conn| {
        attendance::month_summary(conn, month, &class_name, section.as_deref())
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "attendance.save" => save(state, req),
        "attendance.get" => get(state, req),
        "attendance.monthSummary" => month_summary(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_and_map_shapes_parse_the_same() {
        let list = json!([
            { "studentId": 101, "status": "absent", "reason": "sick" },
            { "studentId": 102, "status": "PRESENT" }
        ]);
        let map = json!({
            "101": { "status": "Absent", "reason": "sick" },
            "102": { "status": "present" }
        });
        let mut errors = FieldErrors::default();
        let a = parse_entries(Some(&list), &mut errors);
        let b = parse_entries(Some(&map), &mut errors);
        assert!(errors.is_empty());
        assert_eq!(a, b);
        assert_eq!(a[&101].status, AttendanceStatus::Absent);
    }

    #[test]
    fn bad_entries_are_reported_per_field() {
        let list = json!([
            { "studentId": 101, "status": "late" },
            { "status": "Present" },
            { "studentId": 103, "status": "Present" },
            { "studentId": 103, "status": "Absent" }
        ]);
        let mut errors = FieldErrors::default();
        let parsed = parse_entries(Some(&list), &mut errors);
        assert_eq!(parsed.len(), 1);
        let fields: Vec<&str> = errors.0.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["entries[0]", "entries[1]", "entries[3]"]);
    }

    #[test]
    fn missing_entries_are_rejected_but_empty_ones_are_not() {
        let mut errors = FieldErrors::default();
        parse_entries(None, &mut errors);
        assert!(errors.0.contains_key("entries"));

        for empty in [json!([]), json!({})] {
            let mut errors = FieldErrors::default();
            let parsed = parse_entries(Some(&empty), &mut errors);
            assert!(errors.is_empty());
            assert!(parsed.is_empty());
        }
    }
}
