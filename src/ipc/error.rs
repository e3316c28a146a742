use serde_json::json;
use tracing::{debug, error};

use crate::store::StoreError;
use crate::validate::FieldErrors;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn no_database() -> Self {
        Self::new("no_database", "no database configured; select a workspace first")
    }

    pub fn unauthorized() -> Self {
        Self::new("unauthorized", "sign in required")
    }

    pub fn forbidden() -> Self {
        Self::new("forbidden", "your role does not allow this action")
    }

    /// Log the real cause; the client only sees a generic message.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "request failed");
        Self::new("internal", "internal error")
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NoDatabase => Self::no_database(),
            StoreError::NotFound { .. } => Self::new("not_found", e.to_string()),
            StoreError::Duplicate { .. } => Self::new("duplicate", e.to_string()),
            StoreError::InUse { .. } => Self::new("in_use", e.to_string()),
            StoreError::Rejected(message) => Self::new("rejected", message),
            StoreError::Transient(_) => {
                error!(error = %e, "database stayed busy");
                Self::new("db_busy", "the database is busy; try again")
            }
            StoreError::Sqlite(_) => Self::internal(e),
        }
    }
}

impl From<FieldErrors> for HandlerErr {
    fn from(errors: FieldErrors) -> Self {
        debug!(fields = ?errors.0.keys().collect::<Vec<_>>(), "validation failed");
        Self {
            code: "validation_failed",
            message: "some fields are invalid".to_string(),
            details: Some(errors.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_codes() {
        let dup = HandlerErr::from(StoreError::Duplicate { entity: "student" });
        assert_eq!(dup.code, "duplicate");
        assert_eq!(dup.message, "student already exists");
        assert_eq!(HandlerErr::from(StoreError::NoDatabase).code, "no_database");
        assert_eq!(
            HandlerErr::from(StoreError::Rejected("nope".to_string())).message,
            "nope"
        );
    }

    #[test]
    fn unexpected_errors_hide_their_cause() {
        let e = HandlerErr::from(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
        assert_eq!(e.code, "internal");
        assert_eq!(e.message, "internal error");
    }

    #[test]
    fn field_errors_land_in_details() {
        let e = HandlerErr::from(FieldErrors::single("roll", "is required"));
        let resp = e.response("7");
        assert_eq!(resp["ok"], false);
        assert_eq!(resp["error"]["code"], "validation_failed");
        assert_eq!(resp["error"]["details"]["fields"]["roll"][0], "is required");
    }
}
