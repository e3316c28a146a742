use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{count, data_uri, now_rfc3339, Blob, Page, PageRequest, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: i64,
    pub caption: String,
    pub image: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub embed_url: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
}

/// Read one blob column (plus its mime and optional file-name column) by row id.
/// `Ok(None)` means the row exists but holds no blob.
pub(crate) fn blob_column(
    conn: &Connection,
    table: &str,
    column: &str,
    mime_column: &str,
    name_column: Option<&str>,
    id: i64,
    entity: &'static str,
) -> StoreResult<Option<Blob>> {
    let name_sql = name_column.unwrap_or("NULL");
    let row = conn
        .query_row(
            &format!("SELECT {column}, {mime_column}, {name_sql} FROM {table} WHERE id = ?"),
            [id],
            |r| {
                Ok((
                    r.get::<_, Option<Vec<u8>>>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((bytes, mime, file_name)) = row else {
        return Err(StoreError::NotFound { entity });
    };
    Ok(match (bytes, mime) {
        (Some(bytes), Some(mime)) if !bytes.is_empty() => Some(Blob {
            bytes,
            mime,
            file_name,
        }),
        _ => None,
    })
}

pub fn gallery_list(conn: &Connection, page: PageRequest) -> StoreResult<Page<GalleryImage>> {
    let total = count(conn, "SELECT COUNT(*) FROM gallery_images", [])?;
    let mut stmt = conn.prepare(
        "SELECT id, caption, image, image_mime, created_at
         FROM gallery_images
         ORDER BY created_at DESC, id DESC
         LIMIT ? OFFSET ?",
    )?;
    let items = stmt
        .query_map(params![page.limit(), page.offset()], |r| {
            let bytes: Vec<u8> = r.get(2)?;
            let mime: String = r.get(3)?;
            Ok(GalleryImage {
                id: r.get(0)?,
                caption: r.get(1)?,
                image: data_uri(&mime, &bytes),
                created_at: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, page))
}

pub fn gallery_add(conn: &Connection, caption: &str, image: &Blob) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO gallery_images(caption, image, image_mime, created_at) VALUES(?, ?, ?, ?)",
        params![caption, image.bytes, image.mime, now_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn gallery_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM gallery_images WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "gallery image" });
    }
    Ok(())
}

pub fn gallery_image(conn: &Connection, id: i64) -> StoreResult<Option<Blob>> {
    blob_column(conn, "gallery_images", "image", "image_mime", None, id, "gallery image")
}

pub fn videos_list(conn: &Connection) -> StoreResult<Vec<Video>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, url, sort_order, created_at
         FROM videos
         ORDER BY sort_order, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let url: String = r.get(2)?;
            Ok(Video {
                id: r.get(0)?,
                title: r.get(1)?,
                embed_url: youtube_embed_url(&url),
                url,
                sort_order: r.get(3)?,
                created_at: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn video_add(conn: &Connection, title: &str, url: &str, sort_order: i64) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO videos(title, url, sort_order, created_at) VALUES(?, ?, ?, ?)",
        params![title, url, sort_order, now_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn video_delete(conn: &Connection, id: i64) -> StoreResult<()> {
    if conn.execute("DELETE FROM videos WHERE id = ?", [id])? == 0 {
        return Err(StoreError::NotFound { entity: "video" });
    }
    Ok(())
}

/// `https://www.youtube.com/watch?v=ID` or `https://youtu.be/ID` to an embed URL.
pub fn youtube_embed_url(url: &str) -> Option<String> {
    let rest = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .trim_start_matches("m.");
    let id = if let Some(q) = rest.strip_prefix("youtube.com/watch?") {
        q.split('&').find_map(|kv| kv.strip_prefix("v="))
    } else if let Some(path) = rest.strip_prefix("youtu.be/") {
        path.split(['?', '&']).next()
    } else if let Some(path) = rest.strip_prefix("youtube.com/embed/") {
        path.split(['?', '&']).next()
    } else {
        None
    }?;
    if id.is_empty() {
        return None;
    }
    Some(format!("https://www.youtube.com/embed/{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn embed_url_from_common_youtube_forms() {
        assert_eq!(
            youtube_embed_url("https://www.youtube.com/watch?v=abc123&t=10"),
            Some("https://www.youtube.com/embed/abc123".to_string())
        );
        assert_eq!(
            youtube_embed_url("https://youtu.be/xyz?si=1"),
            Some("https://www.youtube.com/embed/xyz".to_string())
        );
        assert_eq!(youtube_embed_url("https://vimeo.com/1"), None);
    }

    #[test]
    fn gallery_roundtrip_inlines_images() {
        let conn = open_in_memory().expect("open");
        let blob = Blob {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime: "image/png".to_string(),
            file_name: None,
        };
        let id = gallery_add(&conn, "Sports day", &blob).expect("add");
        let page = gallery_list(&conn, PageRequest::new(1, 10)).expect("list");
        assert_eq!(page.total, 1);
        assert!(page.items[0].image.starts_with("data:image/png;base64,"));
        assert_eq!(gallery_image(&conn, id).expect("blob"), Some(blob));
        gallery_delete(&conn, id).expect("delete");
        assert!(matches!(
            gallery_image(&conn, id),
            Err(StoreError::NotFound { .. })
        ));
    }
}
