//! Request parameter validation.
//!
//! A `Form` reads typed values out of a JSON params object and collects every
//! field problem instead of stopping at the first one, so a client can mark
//! all bad inputs at once.

use base64::Engine;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::store::{Blob, PageRequest};

pub const IMAGE_MIMES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];
pub const DOCUMENT_MIMES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub const SHORT_TEXT: usize = 200;
pub const LONG_TEXT: usize = 20_000;

/// Field name to messages. Serialized as `details.fields`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({ "fields": self.0 })
    }
}

pub struct Form<'a> {
    params: &'a Value,
    errors: FieldErrors,
}

impl<'a> Form<'a> {
    pub fn new(params: &'a Value) -> Self {
        Self {
            params,
            errors: FieldErrors::default(),
        }
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn raw(&self, key: &str) -> Option<&'a Value> {
        match self.params.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    fn text(&mut self, key: &str) -> Option<String> {
        match self.raw(key)? {
            Value::String(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.error(key, "must be text");
                None
            }
        }
    }

    /// Trimmed, non-empty, at most `max_len` characters.
    pub fn required_str(&mut self, key: &str, max_len: usize) -> String {
        match self.optional_str(key, max_len) {
            Some(s) => s,
            None => {
                if !self.errors.0.contains_key(key) {
                    self.error(key, "is required");
                }
                String::new()
            }
        }
    }

    /// Blank counts as absent.
    pub fn optional_str(&mut self, key: &str, max_len: usize) -> Option<String> {
        let s = self.text(key)?;
        if s.chars().count() > max_len {
            self.error(key, format!("must be at most {max_len} characters"));
            return None;
        }
        Some(s)
    }

    /// Integers arrive as JSON numbers or numeric strings.
    pub fn optional_i64(&mut self, key: &str) -> Option<i64> {
        let parsed = match self.raw(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) if s.trim().is_empty() => return None,
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.error(key, "must be a whole number");
        }
        parsed
    }

    pub fn required_i64(&mut self, key: &str) -> i64 {
        if self.raw(key).is_none() {
            self.error(key, "is required");
            return 0;
        }
        self.optional_i64(key).unwrap_or_default()
    }

    pub fn i64_or(&mut self, key: &str, default: i64) -> i64 {
        self.optional_i64(key).unwrap_or(default)
    }

    /// A positive row id.
    pub fn id(&mut self, key: &str) -> i64 {
        let id = self.required_i64(key);
        if id <= 0 && !self.errors.0.contains_key(key) {
            self.error(key, "must be a positive id");
        }
        id
    }

    pub fn optional_id(&mut self, key: &str) -> Option<i64> {
        let id = self.optional_i64(key)?;
        if id <= 0 {
            self.error(key, "must be a positive id");
            return None;
        }
        Some(id)
    }

    pub fn bool_or(&mut self, key: &str, default: bool) -> bool {
        match self.raw(key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" | "" => false,
                _ => {
                    self.error(key, "must be true or false");
                    default
                }
            },
            Some(_) => {
                self.error(key, "must be true or false");
                default
            }
        }
    }

    /// `YYYY-MM-DD`.
    pub fn date(&mut self, key: &str) -> Option<NaiveDate> {
        if self.raw(key).is_none() {
            self.error(key, "is required");
            return None;
        }
        self.optional_date(key)
    }

    pub fn optional_date(&mut self, key: &str) -> Option<NaiveDate> {
        let raw = self.text(key)?;
        match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                self.error(key, "must be a date in YYYY-MM-DD format");
                None
            }
        }
    }

    /// `YYYY-MM`, returned as the first day of the month.
    pub fn month(&mut self, key: &str) -> Option<NaiveDate> {
        let Some(raw) = self.text(key) else {
            self.error(key, "is required");
            return None;
        };
        match NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                self.error(key, "must be a month in YYYY-MM format");
                None
            }
        }
    }

    /// A non-negative amount in currency units (`500`, `"500.50"`) as cents.
    pub fn optional_money(&mut self, key: &str) -> Option<i64> {
        let raw = match self.raw(key)? {
            Value::Number(n) => n.to_string(),
            Value::String(s) if s.trim().is_empty() => return None,
            Value::String(s) => s.trim().to_string(),
            _ => {
                self.error(key, "must be an amount");
                return None;
            }
        };
        match parse_cents(&raw) {
            Some(cents) => Some(cents),
            None => {
                self.error(key, "must be a non-negative amount with at most two decimals");
                None
            }
        }
    }

    pub fn money(&mut self, key: &str) -> i64 {
        if self.raw(key).is_none() {
            self.error(key, "is required");
            return 0;
        }
        self.optional_money(key).unwrap_or_default()
    }

    /// One of a closed set of values, parsed by `parse`.
    pub fn choice<T>(
        &mut self,
        key: &str,
        allowed: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let raw = self.text(key)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            self.error(key, format!("must be one of: {allowed}"));
        }
        parsed
    }

    pub fn required_choice<T>(
        &mut self,
        key: &str,
        allowed: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        if self.raw(key).is_none() {
            self.error(key, "is required");
            return None;
        }
        self.choice(key, allowed, parse)
    }

    /// `{fileName, contentType, dataBase64}`; absent or null means no upload.
    pub fn upload(&mut self, key: &str, allowed: &[&str], max_bytes: usize) -> Option<Blob> {
        let raw = self.raw(key)?;
        let Some(obj) = raw.as_object() else {
            self.error(key, "must be an upload object");
            return None;
        };
        let content_type = obj
            .get("contentType")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !allowed.contains(&content_type.as_str()) {
            self.error(key, format!("file type must be one of: {}", allowed.join(", ")));
            return None;
        }
        let Some(data) = obj.get("dataBase64").and_then(Value::as_str) else {
            self.error(key, "file data is missing");
            return None;
        };
        let bytes = match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
            Ok(b) => b,
            Err(_) => {
                self.error(key, "file data is not valid base64");
                return None;
            }
        };
        if bytes.is_empty() {
            self.error(key, "file is empty");
            return None;
        }
        if bytes.len() > max_bytes {
            self.error(key, format!("file must be at most {max_bytes} bytes"));
            return None;
        }
        let file_name = obj
            .get("fileName")
            .and_then(Value::as_str)
            .map(sanitize_file_name)
            .filter(|s| !s.is_empty());
        Some(Blob {
            bytes,
            mime: content_type,
            file_name,
        })
    }

    pub fn required_upload(&mut self, key: &str, allowed: &[&str], max_bytes: usize) -> Option<Blob> {
        if self.raw(key).is_none() {
            self.error(key, "is required");
            return None;
        }
        self.upload(key, allowed, max_bytes)
    }

    /// `page` / `pageSize`, falling back to `default_size`.
    pub fn page(&mut self, default_size: u32) -> PageRequest {
        let page = self.i64_or("page", 1);
        let size = self.i64_or("pageSize", i64::from(default_size));
        if page < 1 {
            self.error("page", "must be at least 1");
        }
        if !(1..=i64::from(PageRequest::MAX_PAGE_SIZE)).contains(&size) {
            self.error(
                "pageSize",
                format!("must be between 1 and {}", PageRequest::MAX_PAGE_SIZE),
            );
        }
        PageRequest::new(
            u32::try_from(page).unwrap_or(1),
            u32::try_from(size).unwrap_or(default_size),
        )
    }
}

fn parse_cents(raw: &str) -> Option<i64> {
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(frac)
}

/// Keep the final path component and drop characters that break headers.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    base.chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collects_every_field_error() {
        let params = json!({ "name": "  ", "roll": "abc", "dateOfBirth": "10/01/2012" });
        let mut form = Form::new(&params);
        form.required_str("name", SHORT_TEXT);
        form.required_i64("roll");
        form.optional_date("dateOfBirth");
        form.required_str("className", SHORT_TEXT);
        let errors = form.finish().expect_err("invalid");
        let fields: Vec<&str> = errors.0.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["className", "dateOfBirth", "name", "roll"]);
        assert_eq!(errors.0["name"], vec!["is required"]);
    }

    #[test]
    fn trims_and_limits_text() {
        let params = json!({ "title": "  Exam notice  ", "code": "x".repeat(11) });
        let mut form = Form::new(&params);
        assert_eq!(form.required_str("title", 50), "Exam notice");
        assert_eq!(form.optional_str("code", 10), None);
        assert!(form.finish().is_err());
    }

    #[test]
    fn money_is_parsed_to_cents() {
        assert_eq!(parse_cents("500"), Some(50_000));
        assert_eq!(parse_cents("500.5"), Some(50_050));
        assert_eq!(parse_cents("0.05"), Some(5));
        assert_eq!(parse_cents("-1"), None);
        assert_eq!(parse_cents("1.234"), None);
        assert_eq!(parse_cents(".5"), None);

        let params = json!({ "amount": 1250.75 });
        let mut form = Form::new(&params);
        assert_eq!(form.money("amount"), 125_075);
        form.finish().expect("valid");
    }

    #[test]
    fn numbers_accept_strings_and_booleans_accept_flags() {
        let params = json!({ "roll": "12", "isMarquee": "on", "isActive": 0 });
        let mut form = Form::new(&params);
        assert_eq!(form.required_i64("roll"), 12);
        assert!(form.bool_or("isMarquee", false));
        assert!(!form.bool_or("isActive", true));
        assert!(form.bool_or("missing", true));
        form.finish().expect("valid");
    }

    #[test]
    fn upload_checks_type_size_and_encoding() {
        let params = json!({
            "photo": { "fileName": "C:\\pics\\me.png", "contentType": "image/PNG", "dataBase64": "aGVsbG8=" },
            "doc": { "fileName": "x.exe", "contentType": "application/x-msdownload", "dataBase64": "aGk=" },
            "big": { "fileName": "b.png", "contentType": "image/png", "dataBase64": "aGVsbG8=" },
            "broken": { "fileName": "c.png", "contentType": "image/png", "dataBase64": "###" },
        });
        let mut form = Form::new(&params);
        let photo = form.upload("photo", IMAGE_MIMES, 1024).expect("photo");
        assert_eq!(photo.bytes, b"hello");
        assert_eq!(photo.mime, "image/png");
        assert_eq!(photo.file_name.as_deref(), Some("me.png"));
        assert!(form.upload("doc", DOCUMENT_MIMES, 1024).is_none());
        assert!(form.upload("big", IMAGE_MIMES, 3).is_none());
        assert!(form.upload("broken", IMAGE_MIMES, 1024).is_none());
        assert!(form.upload("absent", IMAGE_MIMES, 1024).is_none());
        let errors = form.finish().expect_err("invalid");
        assert_eq!(errors.0.len(), 3);
    }

    #[test]
    fn page_defaults_and_bounds() {
        let params = json!({});
        let mut form = Form::new(&params);
        let page = form.page(10);
        assert_eq!((page.page, page.page_size), (1, 10));
        form.finish().expect("valid");

        let params = json!({ "page": 0, "pageSize": 500 });
        let mut form = Form::new(&params);
        form.page(10);
        let errors = form.finish().expect_err("invalid");
        assert!(errors.0.contains_key("page"));
        assert!(errors.0.contains_key("pageSize"));
    }

    #[test]
    fn month_parses_to_first_day() {
        let params = json!({ "month": "2024-02", "bad": "2024-13" });
        let mut form = Form::new(&params);
        assert_eq!(form.month("month"), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(form.month("bad"), None);
        assert!(form.finish().is_err());
    }
}
