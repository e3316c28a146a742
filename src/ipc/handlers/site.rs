use crate::auth::Permission;
use crate::ipc::error::HandlerResult;
use crate::ipc::helpers::{admin_read, admin_write, public_read, respond};
use crate::ipc::types::{AppState, Request};
use crate::pages::Invalidation;
use crate::store::site::{self, SchoolInfoInput};
use crate::validate::{Form, IMAGE_MIMES, LONG_TEXT, SHORT_TEXT};
use serde_json::json;
use tracing::info;

/// Setting keys are short identifiers such as `footer_text` or `admission_open`.
fn setting_key(form: &mut Form<'_>) -> String {
    let key = form.required_str("key", 64);
    if !key.is_empty()
        && !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        form.error("key", "may only contain letters, digits, '_', '.' and '-'");
    }
    key
}

fn school_get(state: &mut AppState) -> HandlerResult {
    public_read(state, None, site::school_info)
}

fn school_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let max_bytes = state.config.uploads.max_bytes;
    let input = SchoolInfoInput {
        name: form.required_str("name", SHORT_TEXT),
        code: form.optional_str("code", 50),
        address: form.optional_str("address", SHORT_TEXT),
        phone: form.optional_str("phone", 30),
        email: form.optional_str("email", SHORT_TEXT),
        established_year: form.optional_i64("establishedYear"),
        about: form.optional_str("about", LONG_TEXT),
        principal_name: form.optional_str("principalName", SHORT_TEXT),
        principal_message: form.optional_str("principalMessage", LONG_TEXT),
        principal_photo: form.upload("principalPhoto", IMAGE_MIMES, max_bytes),
        logo: form.upload("logo", IMAGE_MIMES, max_bytes),
    };
    if input.email.as_deref().is_some_and(|e| !e.contains('@')) {
        form.error("email", "must be an email address");
    }
    if input
        .established_year
        .is_some_and(|y| !(1000..=9999).contains(&y))
    {
        form.error("establishedYear", "must be a four-digit year");
    }
    form.finish()?;

    admin_write(state, req, Permission::ManageSite, Invalidation::All, |conn, actor| {
        site::save_school_info(conn, &input)?;
        info!(
            logo = input.logo.is_some(),
            principal_photo = input.principal_photo.is_some(),
            by = actor.id,
            "school info saved"
        );
        Ok(json!({ "ok": true }))
    })
}

fn settings_list(state: &mut AppState, req: &Request) -> HandlerResult {
    admin_read(state, req, Vec::new(), site::settings_list)
}

fn setting_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let key = setting_key(&mut form);
    form.finish()?;
    let value = admin_read(state, req, None, |conn| site::setting(conn, &key))?;
    Ok(json!({ "key": key, "value": value }))
}

fn setting_set(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let key = setting_key(&mut form);
    let value = match req.params.get("value") {
        Some(serde_json::Value::String(s)) if s.chars().count() <= LONG_TEXT => s.clone(),
        Some(serde_json::Value::String(_)) => {
            form.error("value", format!("must be at most {LONG_TEXT} characters"));
            String::new()
        }
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => {
            form.error("value", "is required");
            String::new()
        }
    };
    form.finish()?;

    admin_write(state, req, Permission::ManageSite, Invalidation::All, |conn, actor| {
        site::set_setting(conn, &key, &value)?;
        info!(key = %key, by = actor.id, "site setting saved");
        Ok(json!({ "ok": true }))
    })
}

fn setting_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut form = Form::new(&req.params);
    let key = setting_key(&mut form);
    form.finish()?;
    admin_write(state, req, Permission::ManageSite, Invalidation::All, |conn, actor| {
        site::delete_setting(conn, &key)?;
        info!(key = %key, by = actor.id, "site setting removed");
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "school.get" => school_get(state),
        "school.update" => school_update(state, req),
        "settings.list" => settings_list(state, req),
        "settings.get" => setting_get(state, req),
        "settings.set" => setting_set(state, req),
        "settings.delete" => setting_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::FieldErrors;

    #[test]
    fn setting_keys_are_identifiers() {
        let params = json!({ "key": "footer text!" });
        let mut form = Form::new(&params);
        setting_key(&mut form);
        assert!(form.finish().is_err());

        let params = json!({ "key": "admission_open" });
        let mut form = Form::new(&params);
        assert_eq!(setting_key(&mut form), "admission_open");
        assert!(form.finish().is_ok());
    }

    #[test]
    fn missing_key_is_a_field_error() {
        let params = json!({});
        let mut form = Form::new(&params);
        setting_key(&mut form);
        let errors: FieldErrors = form.finish().expect_err("key required");
        assert!(errors.0.contains_key("key"));
    }
}
