//! Data access layer: one module per entity family, typed rows, parameterized SQL.
//!
//! Functions take a borrowed `Connection` and hold no state of their own.

pub mod applications;
pub mod attendance;
pub mod fees;
pub mod media;
pub mod nav_links;
pub mod notices;
pub mod people;
pub mod routines;
pub mod site;
pub mod students;
pub mod users;
pub mod widgets;

use base64::Engine;
use rusqlite::ffi::ErrorCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no database configured")]
    NoDatabase,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} already exists")]
    Duplicate { entity: &'static str },

    #[error("{entity} is still referenced by other records")]
    InUse { entity: &'static str },

    #[error("{0}")]
    Rejected(String),

    #[error("database busy: {0}")]
    Transient(#[source] rusqlite::Error),

    #[error("database error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(ref code, _) = err else {
            return Self::Sqlite(err);
        };
        match (code.code, code.extended_code) {
            (ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked, _) => Self::Transient(err),
            (_, SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY) => {
                Self::Duplicate { entity: "record" }
            }
            (_, SQLITE_CONSTRAINT_FOREIGNKEY) => Self::InUse { entity: "record" },
            _ => Self::Sqlite(err),
        }
    }
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Name the entity a classified constraint error is about.
    pub fn on(self, entity: &'static str) -> Self {
        match self {
            Self::Duplicate { .. } => Self::Duplicate { entity },
            Self::InUse { .. } => Self::InUse { entity },
            Self::NotFound { .. } => Self::NotFound { entity },
            other => other,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Closure adapter for `map_err` that converts and names the entity.
pub fn on(entity: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |e| StoreError::from(e).on(entity)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, req: PageRequest) -> Self {
        let per = i64::from(req.page_size);
        let total_pages = u32::try_from((total + per - 1) / per).unwrap_or(u32::MAX);
        Self {
            items,
            total,
            page: req.page,
            page_size: req.page_size,
            total_pages,
        }
    }

    pub fn empty(req: PageRequest) -> Self {
        Self::new(Vec::new(), 0, req)
    }
}

/// A decoded upload or a blob column read back with its mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: Option<String>,
}

impl Blob {
    pub fn data_uri(&self) -> String {
        data_uri(&self.mime, &self.bytes)
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Read an optional `(blob, mime)` column pair as a data URI.
pub fn optional_data_uri(bytes: Option<Vec<u8>>, mime: Option<String>) -> Option<String> {
    match (bytes, mime) {
        (Some(b), Some(m)) if !b.is_empty() => Some(data_uri(&m, &b)),
        _ => None,
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn count(conn: &rusqlite::Connection, sql: &str, params: impl rusqlite::Params) -> StoreResult<i64> {
    Ok(conn.query_row(sql, params, |r| r.get(0))?)
}

/// Escape a free-text search term for a `LIKE ? ESCAPE '\'` clause.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}
