use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::students::split_blob;
use super::{count, like_pattern, now_rfc3339, Blob, Page, PageRequest, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub published_on: String,
    pub is_marquee: bool,
    pub attachment_name: Option<String>,
    pub attachment_mime: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NoticeInput {
    pub title: String,
    pub body: String,
    pub published_on: String,
    pub is_marquee: bool,
    pub attachment: Option<Blob>,
    /// Drop the stored attachment on update when no new one is given.
    pub remove_attachment: bool,
}

const COLUMNS: &str =
    "id, title, body, published_on, is_marquee, attachment_name, attachment_mime, created_at";

fn row_to_notice(r: &Row<'_>) -> rusqlite::Result<Notice> {
    Ok(Notice {
        id: r.get(0)?,
        title: r.get(1)?,
        body: r.get(2)?,
        published_on: r.get(3)?,
        is_marquee: r.get::<_, i64>(4)? != 0,
        attachment_name: r.get(5)?,
        attachment_mime: r.get(6)?,
        created_at: r.get(7)?,
    })
}

/// Newest first. `search` matches the title.
pub fn list(conn: &Connection, search: Option<&str>, page: PageRequest) -> StoreResult<Page<Notice>> {
    let mut binds: Vec<Value> = Vec::new();
    let where_sql = match search.filter(|s| !s.is_empty()) {
        Some(q) => {
            binds.push(Value::Text(like_pattern(q)));
            "WHERE title LIKE ? ESCAPE '\\'"
        }
        None => "",
    };
    let total = count(
        conn,
        &format!("SELECT COUNT(*) FROM notices {where_sql}"),
        params_from_iter(binds.iter()),
    )?;
    binds.push(Value::Integer(page.limit()));
    binds.push(Value::Integer(page.offset()));
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM notices {where_sql}
         ORDER BY published_on DESC, id DESC
         LIMIT ? OFFSET ?"
    ))?;
    let items = stmt
        .query_map(params_from_iter(binds.iter()), row_to_notice)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, page))
}

pub fn latest(conn: &Connection, limit: u32) -> StoreResult<Vec<Notice>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM notices ORDER BY published_on DESC, id DESC LIMIT ?"
    ))?;
    let rows = stmt
        .query_map([i64::from(limit)], row_to_notice)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Notices flagged for the homepage ticker, newest first.
pub fn marquee(conn: &Connection) -> StoreResult<Vec<Notice>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM notices WHERE is_marquee = 1 ORDER BY published_on DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map([], row_to_notice)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, id: i64) -> StoreResult<Notice> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM notices WHERE id = ?"),
        [id],
        row_to_notice,
    )
    .optional()?
    .ok_or(StoreError::NotFound { entity: "notice" })
}

pub fn create(conn: &Connection, input: &NoticeInput) -> StoreResult<i64> {
    let (bytes, mime) = split_blob(input.attachment.as_ref());
    let name = input.attachment.as_ref().and_then(|b| b.file_name.as_deref());
    conn.execute(
        "INSERT INTO notices(title, body, published_on, is_marquee, attachment, attachment_name,
                             attachment_mime, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            input.title,
            input.body,
            input.published_on,
            input.is_marquee,
            bytes,
            name,
            mime,
            now_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, input: &NoticeInput) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE notices SET title = ?, body = ?, published_on = ?, is_marquee = ? WHERE id = ?",
        params![input.title, input.body, input.published_on, input.is_marquee, id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound { entity: "notice" });
    }
    if let Some(b) = &input.attachment {
        conn.execute(
            "UPDATE notices SET attachment = ?, attachment_name = ?, attachment_mime = ? WHERE id = ?",
            params![b.bytes, b.file_name, b.mime, id],
        )?;
    } else if input.remove_attachment {
        conn.execute(
            "UPDATE notices SET attachment = NULL, attachment_name = NULL, attachment_mime = NULL
             WHERE id = ?",
            [id],
        )?;
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM notices WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "notice" });
    }
    Ok(())
}

pub fn attachment(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    super::media::blob_column(
        conn,
        "notices",
        "attachment",
        "attachment_mime",
        Some("attachment_name"),
        id,
        "notice",
    )
}
